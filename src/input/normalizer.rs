// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 输入归一化: 任意尺寸图片 → [3, H, W] 平面 RGB 张量, 数值范围 [0, 1]

use image::GenericImageView;
use ndarray::Array3;
use tracing::debug;

use crate::error::{DetectError, Result};
use crate::models::ModelProfile;

/// 预处理结果
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    /// [3, H, W], 先全部 R, 再 G, 再 B
    pub tensor: Array3<f32>,
    /// 原图宽度 (用于坐标还原)
    pub width: u32,
    /// 原图高度
    pub height: u32,
}

/// 解码图片字节并生成模型输入张量
pub fn normalize(buf: &[u8], profile: &ModelProfile) -> Result<NormalizedInput> {
    let img = image::load_from_memory(buf)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::Decode(format!(
            "image has no pixels ({}x{})",
            width, height
        )));
    }
    debug!(width, height, color = ?img.color(), "decoded image");

    // 去掉 alpha, 统一到 RGB8
    let rgb = img.to_rgb8();
    let resized = profile.resize.resize(&rgb, profile.width, profile.height);

    let tensor = planar(resized.as_raw(), profile.width, profile.height)?;
    Ok(NormalizedInput {
        tensor,
        width,
        height,
    })
}

/// 交错 RGBRGB... 字节 → 平面 RRR..GGG..BBB.. 并除以 255
fn planar(pixels: &[u8], width: u32, height: u32) -> Result<Array3<f32>> {
    let area = width as usize * height as usize;
    if pixels.len() != 3 * area {
        return Err(DetectError::UnsupportedFormat(format!(
            "expected {} RGB bytes, got {}",
            3 * area,
            pixels.len()
        )));
    }

    let mut data = vec![0.0f32; 3 * area];
    for (i, rgb) in pixels.chunks_exact(3).enumerate() {
        data[i] = rgb[0] as f32 / 255.0;
        data[area + i] = rgb[1] as f32 / 255.0;
        data[2 * area + i] = rgb[2] as f32 / 255.0;
    }

    Array3::from_shape_vec((3, height as usize, width as usize), data)
        .map_err(|e| DetectError::UnsupportedFormat(e.to_string()))
}

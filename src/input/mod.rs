// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 输入系统 (Input System)
///
/// 图片字节 → 解码 → 去 alpha → 缩放 → 平面化归一张量
///
/// 缩放策略与坐标还原是成对的: `ResizePolicy::resize` 改变图像的方式
/// 必须与 `ResizePolicy::rescale` 给出的还原因子一致, 两者放在同一个类型里
pub mod normalizer;

pub use normalizer::{normalize, NormalizedInput};

use image::{imageops, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// letterbox 填充灰度值 (144/255)
const PAD_VALUE: u8 = 144;

/// 缩放策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizePolicy {
    /// 直接拉伸到模型分辨率, 不保持宽高比, x/y 独立还原
    #[default]
    Stretch,
    /// 等比缩放后贴在左上角, 其余区域填充, x/y 使用同一比例还原
    Letterbox,
}

/// 模型坐标 → 原图坐标的缩放因子
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rescale {
    pub sx: f32,
    pub sy: f32,
}

impl Rescale {
    pub fn identity() -> Self {
        Self { sx: 1.0, sy: 1.0 }
    }

    pub fn x(&self, x: f32) -> f32 {
        x * self.sx
    }

    pub fn y(&self, y: f32) -> f32 {
        y * self.sy
    }
}

impl ResizePolicy {
    /// 等比缩放比例及缩放后的宽高
    fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round().max(1.0), (h0 * r).round().max(1.0))
    }

    /// 按策略把 RGB 图缩放到 `width x height`
    pub fn resize(&self, img: &RgbImage, width: u32, height: u32) -> RgbImage {
        match self {
            ResizePolicy::Stretch => {
                imageops::resize(img, width, height, imageops::FilterType::Triangle)
            }
            ResizePolicy::Letterbox => {
                let (_, w_new, h_new) = Self::scale_wh(
                    img.width() as f32,
                    img.height() as f32,
                    width as f32,
                    height as f32,
                );
                let resized = imageops::resize(
                    img,
                    w_new as u32,
                    h_new as u32,
                    imageops::FilterType::Triangle,
                );
                let mut canvas = RgbImage::from_pixel(width, height, Rgb([PAD_VALUE; 3]));
                imageops::replace(&mut canvas, &resized, 0, 0);
                canvas
            }
        }
    }

    /// 与 `resize` 对应的坐标还原因子
    pub fn rescale(
        &self,
        width_original: u32,
        height_original: u32,
        width: u32,
        height: u32,
    ) -> Rescale {
        let (w0, h0) = (width_original as f32, height_original as f32);
        let (w1, h1) = (width as f32, height as f32);
        match self {
            ResizePolicy::Stretch => Rescale {
                sx: w0 / w1,
                sy: h0 / h1,
            },
            ResizePolicy::Letterbox => {
                let (r, _, _) = Self::scale_wh(w0, h0, w1, h1);
                Rescale {
                    sx: 1.0 / r,
                    sy: 1.0 / r,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_stretch_rescale_independent_axes() {
        let r = ResizePolicy::Stretch.rescale(1280, 320, 640, 640);
        assert_relative_eq!(r.sx, 2.0);
        assert_relative_eq!(r.sy, 0.5);
        assert_relative_eq!(r.x(320.0), 640.0);
        assert_relative_eq!(r.y(320.0), 160.0);
    }

    #[test]
    fn test_letterbox_rescale_shared_ratio() {
        let r = ResizePolicy::Letterbox.rescale(1280, 320, 640, 640);
        assert_relative_eq!(r.sx, 2.0);
        assert_relative_eq!(r.sy, 2.0);
    }

    #[test]
    fn test_stretch_resize_fills_target() {
        let img = RgbImage::from_pixel(30, 10, Rgb([10, 20, 30]));
        let out = ResizePolicy::Stretch.resize(&img, 16, 16);
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(15, 15), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_letterbox_resize_pads_bottom() {
        let img = RgbImage::from_pixel(32, 16, Rgb([200, 0, 0]));
        let out = ResizePolicy::Letterbox.resize(&img, 16, 16);
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 0, 0]));
        assert_eq!(out.get_pixel(0, 15), &Rgb([PAD_VALUE; 3]));
    }
}

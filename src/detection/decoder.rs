// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 输出解码
//
// 输出格式 [1, 4 + nc, N] (或去掉 batch 维的 [4 + nc, N]), 行优先:
// - 前 4 行: cx, cy, w, h (模型输入坐标系)
// - 之后每行一个类别在 N 个候选位置上的置信度

use ndarray::{s, ArrayD, ArrayView2, Axis};
use tracing::debug;

use super::types::{BBox, Detection};
use crate::error::{DetectError, Result};
use crate::input::Rescale;
use crate::models::{ModelProfile, CXYWH_OFFSET};

/// 把原始输出解码为候选检测 (未排序、未去重)
///
/// 置信度低于 `conf` 的候选位置直接丢弃; 保留的框按 `rescale` 还原到原图坐标
pub fn decode(
    raw: &ArrayD<f32>,
    profile: &ModelProfile,
    rescale: Rescale,
    conf: f32,
) -> Result<Vec<Detection>> {
    if profile.nc() == 0 {
        return Err(DetectError::Config("class vocabulary is empty".to_string()));
    }
    let expected = profile.output_len();
    if raw.len() != expected {
        return Err(DetectError::ShapeMismatch {
            expected,
            actual: raw.len(),
        });
    }

    let rows = CXYWH_OFFSET + profile.nc();
    let raw = raw.as_standard_layout();
    let flat = raw
        .as_slice()
        .ok_or_else(|| DetectError::inference("model output is not contiguous"))?;
    let preds = ArrayView2::from_shape((rows, profile.candidates), flat).map_err(|_| {
        DetectError::ShapeMismatch {
            expected,
            actual: flat.len(),
        }
    })?;

    let mut ys = Vec::new();
    for pred in preds.axis_iter(Axis(1)) {
        let bbox = pred.slice(s![0..CXYWH_OFFSET]);
        let clss = pred.slice(s![CXYWH_OFFSET..]);

        // 严格大于: 置信度相同时保留下标最小的类别
        let (id, confidence) = clss
            .iter()
            .enumerate()
            .fold((0usize, 0.0f32), |max, (i, &c)| {
                if c > max.1 {
                    (i, c)
                } else {
                    max
                }
            });

        if confidence < conf {
            continue;
        }

        let b = BBox::from_cxcywh(bbox[0], bbox[1], bbox[2], bbox[3]);
        let b = BBox::new(
            rescale.x(b.x1),
            rescale.y(b.y1),
            rescale.x(b.x2),
            rescale.y(b.y2),
        );
        ys.push(Detection::new(b, id, profile.names[id].as_str(), confidence));
    }

    debug!(
        candidates = profile.candidates,
        kept = ys.len(),
        conf,
        "decoded model output"
    );
    Ok(ys)
}

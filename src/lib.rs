// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 检测配置参数
pub mod detection; // 解码与NMS
pub mod error;
pub mod input; // 图片输入与归一化
pub mod models; // 模型接口与具体实现
pub mod ort_backend;

pub use crate::config::{Args, DetectConfig};
pub use crate::detection::{
    format_detections, non_max_suppression, suppress, BBox, Detection, NO_OBJECTS,
};
pub use crate::error::{DetectError, Result};
pub use crate::input::{NormalizedInput, Rescale, ResizePolicy};
pub use crate::models::{ModelProfile, YOLOv8, COCO_CLASSES};
pub use crate::ort_backend::{InferenceEngine, OrtBackend, OrtConfig, OrtEP};

/// 单张图片目标检测
///
/// 图片字节 → 归一化张量 → 推理 → 解码 → NMS, 结果按置信度降序排列
pub fn detect_objects(image: &[u8], model: &YOLOv8) -> Result<Vec<Detection>> {
    model.forward(image)
}

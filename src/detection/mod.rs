// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测后处理 (Detection Post-processing)
///
/// - decoder: 原始输出 → 候选检测 (置信度过滤 + 坐标还原)
/// - nms:     贪心非极大值抑制
/// - types:   检测框与检测结果
pub mod decoder;
pub mod nms;
pub mod types;

pub use decoder::decode;
pub use nms::{non_max_suppression, suppress};
pub use types::{format_detections, BBox, Detection, NO_OBJECTS};

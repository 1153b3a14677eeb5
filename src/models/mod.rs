// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 模型描述与实现
//!
//! ## ModelProfile
//! 模型的固定形状参数 (输入分辨率、候选框数量、类别表、张量名称、缩放策略)
//! 作为显式结构注入, 不再写死在代码里, 便于替换不同尺寸/类别的模型
//!
//! ## 核心流程
//! ```text
//! 图片字节 → preprocess → [3,H,W] 张量
//!          ↓
//!     推理引擎 run ([1,3,H,W] → [1,4+nc,N])
//!          ↓
//!     原始输出 → decode → suppress → 检测结果
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};
use crate::input::{ResizePolicy, Rescale};

pub mod yolov8;

pub use yolov8::YOLOv8;

/// COCO 数据集类别名称 (与 YOLOv8 输出通道顺序一致)
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// 检测框回归通道数 (cx, cy, w, h)
pub const CXYWH_OFFSET: usize = 4;

/// 模型形状描述
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelProfile {
    pub width: u32,
    pub height: u32,
    /// 每张图的候选位置数 (640 输入时为 80² + 40² + 20² = 8400)
    pub candidates: usize,
    /// 类别表, 下标即输出中的类别行偏移
    pub names: Vec<String>,
    pub input_name: String,
    pub output_name: String,
    /// 缩放策略, 同时决定解码时的坐标还原公式
    pub resize: ResizePolicy,
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self {
            width: 640,
            height: 640,
            candidates: 8400,
            names: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
            input_name: "images".to_string(),
            output_name: "output0".to_string(),
            resize: ResizePolicy::Stretch,
        }
    }
}

impl ModelProfile {
    /// 类别数量
    pub fn nc(&self) -> usize {
        self.names.len()
    }

    /// YOLOv8 三个检测头 (stride 8/16/32) 在给定输入尺寸下的候选位置总数
    pub fn yolov8_candidates(width: u32, height: u32) -> usize {
        [8, 16, 32]
            .iter()
            .map(|s| (width / s) as usize * (height / s) as usize)
            .sum()
    }

    /// 原始输出张量应有的元素个数
    pub fn output_len(&self) -> usize {
        (CXYWH_OFFSET + self.nc()) * self.candidates
    }

    /// 由原图尺寸得到模型坐标 → 原图坐标的缩放因子
    pub fn rescale(&self, width_original: u32, height_original: u32) -> Rescale {
        self.resize
            .rescale(width_original, height_original, self.width, self.height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DetectError::Config(format!(
                "input resolution must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.candidates == 0 {
            return Err(DetectError::Config(
                "candidate count must be positive".to_string(),
            ));
        }
        if self.names.is_empty() {
            return Err(DetectError::Config(
                "class vocabulary is empty".to_string(),
            ));
        }
        if self.input_name.is_empty() || self.output_name.is_empty() {
            return Err(DetectError::Config(
                "tensor names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测错误类型
//!
//! 每个错误对当前请求都是终止性的, 核心内部不重试

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    /// 图片字节无效或无法解码
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// 颜色空间/格式无法转换为 RGB
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// 推理引擎拒绝输入或内部失败
    #[error("inference failed: {0}")]
    Inference(String),

    /// 模型输出长度与 (4 + nc) * candidates 不符
    #[error("model output shape mismatch: expected {expected} values, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<image::ImageError> for DetectError {
    fn from(err: image::ImageError) -> Self {
        use image::error::{ImageFormatHint, UnsupportedErrorKind};

        match err {
            // 无法识别格式: 字节本身就不是图片
            image::ImageError::Unsupported(e)
                if matches!(e.kind(), UnsupportedErrorKind::Format(ImageFormatHint::Unknown)) =>
            {
                DetectError::Decode(e.to_string())
            }
            image::ImageError::Unsupported(e) => DetectError::UnsupportedFormat(e.to_string()),
            e => DetectError::Decode(e.to_string()),
        }
    }
}

impl DetectError {
    pub fn inference(msg: impl std::fmt::Display) -> Self {
        DetectError::Inference(msg.to_string())
    }
}

pub type Result<T, E = DetectError> = std::result::Result<T, E>;

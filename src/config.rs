// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测配置 - 通过JSON文件或命令行调整参数

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DetectError, Result};
use crate::input::ResizePolicy;
use crate::models::ModelProfile;
use crate::ort_backend::{OrtConfig, OrtEP};

/// 检测参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub model: PathBuf,
    pub conf: f32, // 候选置信度阈值
    pub iou: f32,  // NMS IOU阈值
    pub sessions: usize,
    pub intra_threads: Option<usize>,
    /// 模型 metadata 带类别表时优先使用
    pub names_from_model: bool,
    /// 打印各阶段耗时
    pub profile: bool,
    pub model_profile: ModelProfile,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("models/yolov8m.onnx"),
            conf: 0.5,
            iou: 0.7,
            sessions: 1,
            intra_threads: None,
            names_from_model: true,
            profile: false,
            model_profile: ModelProfile::default(),
        }
    }
}

impl DetectConfig {
    /// 从JSON文件加载配置, 缺省字段使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| DetectError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("conf", self.conf), ("iou", self.iou)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(DetectError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, v
                )));
            }
        }
        if self.sessions == 0 {
            return Err(DetectError::Config(
                "at least one session is required".to_string(),
            ));
        }
        self.model_profile.validate()
    }

    pub fn ort_config(&self, ep: OrtEP) -> OrtConfig {
        OrtConfig {
            f: self.model.clone(),
            ep,
            sessions: self.sessions,
            intra_threads: self.intra_threads,
        }
    }
}

/// 命令行参数
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "YOLOv8 图片目标检测", long_about = None)]
pub struct Args {
    /// onnx 模型路径
    #[arg(long, required_unless_present = "config")]
    pub model: Option<PathBuf>,

    /// 待检测图片
    #[arg(required = true)]
    pub source: Vec<PathBuf>,

    /// JSON 配置文件 (命令行参数覆盖其中的值)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IOU阈值
    #[arg(long)]
    pub iou: Option<f32>,

    /// 模型输入宽度
    #[arg(long)]
    pub width: Option<u32>,

    /// 模型输入高度
    #[arg(long)]
    pub height: Option<u32>,

    /// 使用 letterbox 等比缩放 (默认拉伸)
    #[arg(long)]
    pub letterbox: bool,

    /// 会话池大小
    #[arg(long)]
    pub sessions: Option<usize>,

    /// 并发处理图片的线程数
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    #[arg(long)]
    pub cuda: bool,

    #[arg(long)]
    pub trt: bool,

    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,

    /// 打印各阶段耗时
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    /// 合并配置文件与命令行参数
    pub fn detect_config(&self) -> Result<DetectConfig> {
        let mut config = match &self.config {
            Some(path) => DetectConfig::load(path)?,
            None => DetectConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(conf) = self.conf {
            config.conf = conf;
        }
        if let Some(iou) = self.iou {
            config.iou = iou;
        }
        // 候选数由分辨率推出时跟随新分辨率, 配置文件显式指定的值保持不变
        let p = &mut config.model_profile;
        let derived = p.candidates == ModelProfile::yolov8_candidates(p.width, p.height);
        if let Some(width) = self.width {
            p.width = width;
        }
        if let Some(height) = self.height {
            p.height = height;
        }
        if derived {
            p.candidates = ModelProfile::yolov8_candidates(p.width, p.height);
        }
        if self.letterbox {
            config.model_profile.resize = ResizePolicy::Letterbox;
        }
        if let Some(sessions) = self.sessions {
            config.sessions = sessions;
        }
        config.profile |= self.profile;
        config.validate()?;
        Ok(config)
    }

    pub fn ep(&self) -> OrtEP {
        if self.trt {
            OrtEP::Trt(self.device_id)
        } else if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        }
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
//
// 推理引擎本身是黑盒: 给定 [1,3,H,W] 张量, 返回固定形状的输出张量
// 会话是唯一共享的可变资源, 每个会话由独立的 Mutex 保护, 多个请求按轮询取用

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::{Array, Array4, ArrayD, IxDyn};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Tensor;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{DetectError, Result};

/// 推理引擎接口
///
/// 实现必须可被多个线程同时调用 (内部同步或无状态)
pub trait InferenceEngine: Send + Sync {
    /// 以 `input_name` 提交一个 [1,3,H,W] 张量, 取回 `output_name` 对应的输出
    fn run(&self, input_name: &str, output_name: &str, xs: Array4<f32>) -> Result<ArrayD<f32>>;
}

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrtEP {
    #[default]
    CPU,
    CUDA(i32),
    Trt(i32),
}

/// 后端构建参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// onnx 模型文件
    pub f: PathBuf,
    pub ep: OrtEP,
    /// 会话池大小 (并发请求数)
    pub sessions: usize,
    pub intra_threads: Option<usize>,
}

impl OrtConfig {
    pub fn new(f: impl AsRef<Path>) -> Self {
        Self {
            f: f.as_ref().to_path_buf(),
            ep: OrtEP::CPU,
            sessions: 1,
            intra_threads: None,
        }
    }
}

/// ONNX Runtime 会话池
pub struct OrtBackend {
    sessions: Vec<Mutex<Session>>,
    next: AtomicUsize,
    inputs: Vec<String>,
    outputs: Vec<String>,
    names: Option<Vec<String>>,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        if !config.f.exists() {
            return Err(DetectError::Config(format!(
                "model file not found: {}",
                config.f.display()
            )));
        }

        let pool_size = config.sessions.max(1);
        info!(model = %config.f.display(), sessions = pool_size, ep = ?config.ep, "loading model");

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(Mutex::new(Self::session(&config)?));
        }

        // 会话全部来自同一个模型文件, 只需检查第一个
        let (inputs, outputs, names) = {
            let session = &sessions[0];
            let session = session
                .lock()
                .map_err(|e| DetectError::inference(format!("session lock poisoned: {e}")))?;
            let inputs: Vec<String> = session.inputs.iter().map(|x| x.name.to_string()).collect();
            let outputs: Vec<String> =
                session.outputs.iter().map(|x| x.name.to_string()).collect();
            (inputs, outputs, Self::read_names(&session))
        };
        debug!(?inputs, ?outputs, nc = names.as_ref().map(|n| n.len()), "model loaded");

        Ok(Self {
            sessions,
            next: AtomicUsize::new(0),
            inputs,
            outputs,
            names,
        })
    }

    fn session(config: &OrtConfig) -> Result<Session> {
        let mut builder = Session::builder()
            .map_err(DetectError::inference)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(DetectError::inference)?;
        if let Some(n) = config.intra_threads {
            builder = builder
                .with_intra_threads(n)
                .map_err(DetectError::inference)?;
        }
        builder = Self::register_ep(builder, config.ep)?;
        builder
            .commit_from_file(&config.f)
            .map_err(DetectError::inference)
    }

    #[allow(unused_mut)]
    fn register_ep(mut builder: SessionBuilder, ep: OrtEP) -> Result<SessionBuilder> {
        match ep {
            OrtEP::CPU => {}
            #[cfg(feature = "cuda")]
            OrtEP::CUDA(device_id) => {
                use ort::execution_providers::CUDAExecutionProvider;
                builder = builder
                    .with_execution_providers([CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build()])
                    .map_err(DetectError::inference)?;
            }
            #[cfg(feature = "tensorrt")]
            OrtEP::Trt(device_id) => {
                use ort::execution_providers::TensorRTExecutionProvider;
                builder = builder
                    .with_execution_providers([TensorRTExecutionProvider::default()
                        .with_device_id(device_id)
                        .build()])
                    .map_err(DetectError::inference)?;
            }
            #[allow(unreachable_patterns)]
            other => {
                warn!(ep = ?other, "execution provider not compiled in, falling back to CPU");
            }
        }
        Ok(builder)
    }

    /// 读取 ultralytics 导出模型 metadata 中的 `names`
    fn read_names(session: &Session) -> Option<Vec<String>> {
        let metadata = session.metadata().ok()?;
        let raw = metadata.custom("names").ok()??;
        parse_names(&raw)
    }

    /// 轮询取下一个会话
    fn next_session(&self) -> &Mutex<Session> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        &self.sessions[index]
    }

    /// 模型自带的类别表 (如果有)
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    /// 检查配置的输入/输出名称在模型中存在
    pub fn check_io(&self, input_name: &str, output_name: &str) -> Result<()> {
        if !self.inputs.iter().any(|x| x == input_name) {
            return Err(DetectError::Config(format!(
                "model has no input named `{}` (inputs: {:?})",
                input_name, self.inputs
            )));
        }
        if !self.outputs.iter().any(|x| x == output_name) {
            return Err(DetectError::Config(format!(
                "model has no output named `{}` (outputs: {:?})",
                output_name, self.outputs
            )));
        }
        Ok(())
    }
}

impl InferenceEngine for OrtBackend {
    fn run(&self, input_name: &str, output_name: &str, xs: Array4<f32>) -> Result<ArrayD<f32>> {
        let (n, c, h, w) = xs.dim();
        let (data, _) = xs.as_standard_layout().into_owned().into_raw_vec_and_offset();
        let tensor = Tensor::from_array(([n, c, h, w], data)).map_err(DetectError::inference)?;

        let mut session = self
            .next_session()
            .lock()
            .map_err(|e| DetectError::inference(format!("session lock poisoned: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_name => tensor])
            .map_err(DetectError::inference)?;
        let output = outputs.get(output_name).ok_or_else(|| {
            DetectError::inference(format!("model produced no output named `{output_name}`"))
        })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(DetectError::inference)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Array::from_shape_vec(IxDyn(&dims), data.to_vec()).map_err(DetectError::inference)
    }
}

/// 解析 `{0: 'person', 1: 'bicycle', ...}` 形式的类别表
///
/// 下标必须从 0 开始连续, 否则返回 None
pub fn parse_names(raw: &str) -> Option<Vec<String>> {
    let re = Regex::new(r#"(\d+)\s*:\s*['"]([^'"]*)['"]"#).ok()?;
    let mut pairs: Vec<(usize, String)> = re
        .captures_iter(raw)
        .filter_map(|cap| Some((cap[1].parse().ok()?, cap[2].to_string())))
        .collect();
    if pairs.is_empty() {
        return None;
    }
    pairs.sort_by_key(|(i, _)| *i);
    if pairs.iter().enumerate().any(|(k, (i, _))| k != *i) {
        return None;
    }
    Some(pairs.into_iter().map(|(_, name)| name).collect())
}

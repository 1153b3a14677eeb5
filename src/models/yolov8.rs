// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 检测模型
// 包含: 预处理、推理、后处理, 推理引擎通过 InferenceEngine 注入

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array3, ArrayD, Axis};
use tracing::{debug, info};

use crate::config::DetectConfig;
use crate::detection::{self, Detection};
use crate::error::{DetectError, Result};
use crate::input::{self, NormalizedInput};
use crate::ort_backend::{InferenceEngine, OrtBackend, OrtEP};

use super::ModelProfile;

/// YOLOv8 检测器 = 配置 + 推理引擎句柄
///
/// 可在多个线程间共享, 并发度取决于引擎 (OrtBackend 的会话池大小)
pub struct YOLOv8 {
    engine: Arc<dyn InferenceEngine>,
    profile: ModelProfile,
    conf: f32,
    iou: f32,
    timing: bool,
}

impl YOLOv8 {
    /// 使用已有的推理引擎
    pub fn new(config: DetectConfig, engine: Arc<dyn InferenceEngine>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            profile: config.model_profile,
            conf: config.conf,
            iou: config.iou,
            timing: config.profile,
        })
    }

    /// 加载 onnx 模型并创建检测器
    pub fn from_config(mut config: DetectConfig, ep: OrtEP) -> Result<Self> {
        config.validate()?;
        let engine = OrtBackend::build(config.ort_config(ep))?;
        engine.check_io(
            &config.model_profile.input_name,
            &config.model_profile.output_name,
        )?;
        if config.names_from_model {
            if let Some(names) = engine.names() {
                debug!(nc = names.len(), "using class names from model metadata");
                config.model_profile.names = names.to_vec();
            }
        }
        Self::new(config, Arc::new(engine))
    }

    /// 预处理: 图片字节 → [3,H,W] 张量 + 原图尺寸
    pub fn preprocess(&self, buf: &[u8]) -> Result<NormalizedInput> {
        input::normalize(buf, &self.profile)
    }

    /// 推理: [3,H,W] → [1,3,H,W] → 原始输出
    pub fn run(&self, xs: Array3<f32>) -> Result<ArrayD<f32>> {
        let expected = (3, self.profile.height as usize, self.profile.width as usize);
        if xs.dim() != expected {
            return Err(DetectError::inference(format!(
                "input tensor shape {:?} does not match model input {:?}",
                xs.dim(),
                expected
            )));
        }
        self.engine.run(
            &self.profile.input_name,
            &self.profile.output_name,
            xs.insert_axis(Axis(0)),
        )
    }

    /// 后处理: 解码 + NMS
    pub fn postprocess(
        &self,
        ys: ArrayD<f32>,
        width_original: u32,
        height_original: u32,
    ) -> Result<Vec<Detection>> {
        let rescale = self.profile.rescale(width_original, height_original);
        let candidates = detection::decode(&ys, &self.profile, rescale, self.conf)?;
        let n = candidates.len();
        let ys = detection::suppress(candidates, self.iou);
        debug!(candidates = n, detections = ys.len(), "postprocess done");
        Ok(ys)
    }

    /// 完整流程: preprocess → run → postprocess
    pub fn forward(&self, buf: &[u8]) -> Result<Vec<Detection>> {
        let t_pre = Instant::now();
        let x = self.preprocess(buf)?;
        if self.timing {
            info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = Instant::now();
        let ys = self.run(x.tensor)?;
        if self.timing {
            info!("[Model Inference]: {:?}", t_run.elapsed());
        }

        let t_post = Instant::now();
        let ys = self.postprocess(ys, x.width, x.height)?;
        if self.timing {
            info!("[Model Postprocess]: {:?}", t_post.elapsed());
        }

        Ok(ys)
    }

    pub fn summary(&self) {
        info!(
            "Summary: input {}x{}, candidates: {}, nc: {}, resize: {:?}, conf: {}, iou: {}",
            self.profile.width,
            self.profile.height,
            self.profile.candidates,
            self.profile.nc(),
            self.profile.resize,
            self.conf,
            self.iou,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BBox;
    use crate::input::ResizePolicy;
    use approx::assert_relative_eq;
    use image::{ImageFormat, Rgb, RgbImage};
    use ndarray::{Array4, IxDyn};
    use std::io::Cursor;
    use std::sync::Mutex;

    /// 返回固定输出, 并记录收到的输入形状与名称
    struct ScriptedEngine {
        output: ArrayD<f32>,
        seen: Mutex<Vec<(String, String, Vec<usize>)>>,
    }

    impl ScriptedEngine {
        fn new(output: ArrayD<f32>) -> Arc<Self> {
            Arc::new(Self {
                output,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl InferenceEngine for ScriptedEngine {
        fn run(&self, input_name: &str, output_name: &str, xs: Array4<f32>) -> Result<ArrayD<f32>> {
            self.seen.lock().unwrap().push((
                input_name.to_string(),
                output_name.to_string(),
                xs.shape().to_vec(),
            ));
            Ok(self.output.clone())
        }
    }

    struct FailingEngine;

    impl InferenceEngine for FailingEngine {
        fn run(&self, _: &str, _: &str, _: Array4<f32>) -> Result<ArrayD<f32>> {
            Err(DetectError::inference("engine exploded"))
        }
    }

    /// [1, 4 + nc, n] 输出
    fn output(nc: usize, n: usize, cands: &[(usize, [f32; 4], usize, f32)]) -> ArrayD<f32> {
        let mut ys = ArrayD::zeros(IxDyn(&[1, 4 + nc, n]));
        for &(idx, xywh, class_id, score) in cands {
            for (r, v) in xywh.iter().enumerate() {
                ys[[0, r, idx]] = *v;
            }
            ys[[0, 4 + class_id, idx]] = score;
        }
        ys
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([90, 120, 200]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    /// 16x16 输入、3 类、6 个候选的小模型
    fn tiny_config() -> DetectConfig {
        let mut config = DetectConfig::default();
        config.model_profile = ModelProfile {
            width: 16,
            height: 16,
            candidates: 6,
            names: vec!["cat".into(), "dog".into(), "bird".into()],
            ..Default::default()
        };
        config
    }

    #[test]
    fn test_forward_single_detection() {
        let raw = output(80, 8400, &[(0, [320., 320., 100., 100.], 0, 0.9)]);
        let engine = ScriptedEngine::new(raw);
        let model = YOLOv8::new(DetectConfig::default(), engine.clone()).unwrap();

        let ys = model.forward(&png(640, 640)).unwrap();
        assert_eq!(ys.len(), 1);
        assert_eq!(ys[0].label, "person");
        assert_relative_eq!(ys[0].confidence, 0.9);
        assert_eq!(ys[0].bbox, BBox::new(270., 270., 370., 370.));

        let seen = engine.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "images");
        assert_eq!(seen[0].1, "output0");
        assert_eq!(seen[0].2, vec![1, 3, 640, 640]);
    }

    #[test]
    fn test_forward_rescales_and_suppresses() {
        let raw = output(
            3,
            6,
            &[
                // 两个几乎重合的框, 不同类别
                (0, [8., 8., 4., 4.], 0, 0.6),
                (1, [8., 8., 4.1, 4.1], 1, 0.9),
                // 远离的框
                (4, [2., 2., 2., 2.], 2, 0.7),
                // 低于阈值
                (5, [12., 12., 2., 2.], 2, 0.3),
            ],
        );
        let model = YOLOv8::new(tiny_config(), ScriptedEngine::new(raw)).unwrap();

        let ys = model.forward(&png(32, 8)).unwrap();
        let labels: Vec<_> = ys.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["dog", "bird"]);

        // 拉伸缩放: x * 2, y * 0.5
        let bird = ys[1].bbox;
        assert_relative_eq!(bird.x1, 2.);
        assert_relative_eq!(bird.x2, 6.);
        assert_relative_eq!(bird.y1, 0.5);
        assert_relative_eq!(bird.y2, 1.5);
    }

    #[test]
    fn test_forward_letterbox_rescale() {
        let raw = output(3, 6, &[(2, [8., 4., 4., 4.], 1, 0.8)]);
        let mut config = tiny_config();
        config.model_profile.resize = ResizePolicy::Letterbox;
        let model = YOLOv8::new(config, ScriptedEngine::new(raw)).unwrap();

        // 32x8 → 16x4, 比例 0.5, x/y 同比还原
        let ys = model.forward(&png(32, 8)).unwrap();
        assert_eq!(ys.len(), 1);
        assert_eq!(ys[0].bbox, BBox::new(12., 4., 20., 12.));
    }

    #[test]
    fn test_forward_nothing_above_threshold() {
        let raw = output(3, 6, &[(0, [8., 8., 4., 4.], 0, 0.3)]);
        let model = YOLOv8::new(tiny_config(), ScriptedEngine::new(raw)).unwrap();
        assert!(model.forward(&png(16, 16)).unwrap().is_empty());
    }

    #[test]
    fn test_inference_error_propagates() {
        let model = YOLOv8::new(tiny_config(), Arc::new(FailingEngine)).unwrap();
        let err = model.forward(&png(16, 16)).unwrap_err();
        assert!(matches!(err, DetectError::Inference(_)));
    }

    #[test]
    fn test_shape_mismatch_propagates() {
        // 引擎返回 80 类输出, 但配置只有 3 类
        let raw = output(80, 6, &[]);
        let model = YOLOv8::new(tiny_config(), ScriptedEngine::new(raw)).unwrap();
        let err = model.forward(&png(16, 16)).unwrap_err();
        assert!(matches!(err, DetectError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_decode_error_skips_engine() {
        let engine = ScriptedEngine::new(output(3, 6, &[]));
        let model = YOLOv8::new(tiny_config(), engine.clone()).unwrap();
        let err = model.forward(b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, DetectError::Decode(_)));
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_run_rejects_wrong_input_shape() {
        let model = YOLOv8::new(tiny_config(), ScriptedEngine::new(output(3, 6, &[]))).unwrap();
        let err = model.run(Array3::zeros((3, 8, 8))).unwrap_err();
        assert!(matches!(err, DetectError::Inference(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectConfig {
            iou: 3.0,
            ..tiny_config()
        };
        assert!(YOLOv8::new(config, Arc::new(FailingEngine)).is_err());
    }
}

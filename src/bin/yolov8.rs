// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// YOLOv8 图片目标检测
///
/// 主程序入口 - 直接运行: cargo run --bin yolov8 --release -- --model models/yolov8m.onnx bus.jpg
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use yolov8_detect::{detect_objects, format_detections, Args, Detection, YOLOv8};

/// JSON 输出的单张图片结果
#[derive(Serialize)]
struct ImageReport {
    source: PathBuf,
    detections: Vec<Detection>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("yolov8_detect=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args.detect_config().context("invalid configuration")?;
    let model_path = config.model.clone();
    let model = Arc::new(
        YOLOv8::from_config(config, args.ep())
            .with_context(|| format!("failed to load model {}", model_path.display()))?,
    );
    model.summary();

    // Channel 1: 主线程 → 工作线程 (图片路径)
    let (tx_job, rx_job) = bounded::<(usize, PathBuf)>(args.workers.max(1) * 2);
    // Channel 2: 工作线程 → 主线程 (检测结果)
    let (tx_result, rx_result) = bounded(args.workers.max(1) * 2);

    let n = args.source.len();
    let mut results: Vec<Option<anyhow::Result<Vec<Detection>>>> = (0..n).map(|_| None).collect();

    thread::scope(|s| {
        for _ in 0..args.workers.max(1) {
            let rx_job = rx_job.clone();
            let tx_result = tx_result.clone();
            let model = Arc::clone(&model);
            s.spawn(move || {
                for (i, path) in rx_job {
                    let ys = fs::read(&path)
                        .with_context(|| format!("failed to read {}", path.display()))
                        .and_then(|buf| {
                            detect_objects(&buf, &model)
                                .with_context(|| format!("detection failed on {}", path.display()))
                        });
                    if tx_result.send((i, ys)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(rx_job);
        drop(tx_result);

        let sources = args.source.clone();
        s.spawn(move || {
            for job in sources.into_iter().enumerate() {
                if tx_job.send(job).is_err() {
                    break;
                }
            }
        });

        for (i, ys) in rx_result {
            results[i] = Some(ys);
        }
    });

    // 按输入顺序输出
    let mut failed = 0;
    let mut reports = Vec::new();
    for (path, ys) in args.source.iter().zip(results) {
        match ys {
            Some(Ok(detections)) => {
                info!(source = %path.display(), n = detections.len(), "done");
                if args.json {
                    reports.push(ImageReport {
                        source: path.clone(),
                        detections,
                    });
                } else {
                    println!("{}:", path.display());
                    println!("{}", format_detections(&detections));
                }
            }
            Some(Err(e)) => {
                failed += 1;
                error!("{:#}", e);
            }
            None => {
                failed += 1;
                error!(source = %path.display(), "worker exited before processing");
            }
        }
    }
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} images failed", failed, n);
    }
    Ok(())
}

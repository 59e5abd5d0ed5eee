// 该文件是 Fengfan （风帆） 项目的一部分。
// src/bin/train_pipeline.rs - 训练表格分类流水线
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use fengfan::{
  dataset::Dataset,
  model::{Classifier, FitOptions, LinearPipeline, save_onnx, to_onnx},
};

/// Fengfan 训练参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出目录
  #[arg(long, value_name = "DIR", default_value = "outputs")]
  pub output_dir: PathBuf,
  /// 模型名称，输出 <output-dir>/<model-name>.onnx 与同名 .json 流水线参数
  #[arg(long, value_name = "NAME", default_value = "blobs-classifier")]
  pub model_name: String,
  #[arg(long, default_value_t = 1500)]
  pub samples: usize,
  #[arg(long, default_value_t = 4)]
  pub features: usize,
  #[arg(long, default_value_t = 3)]
  pub classes: usize,
  #[arg(long, default_value_t = 42)]
  pub seed: u64,
  /// 测试集比例 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.2)]
  pub test_ratio: f32,
  #[arg(long, default_value_t = 500)]
  pub epochs: usize,
  #[arg(long, default_value_t = 0.5)]
  pub learning_rate: f32,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输出目录: {}", args.output_dir.display());
  info!("模型名称: {}", args.model_name);

  let dataset = Dataset::blobs(args.samples, args.features, args.classes, args.seed);
  let (train, test) = dataset.train_test_split(args.test_ratio, args.seed);
  info!("训练集: {} 个样本, 测试集: {} 个样本", train.len(), test.len());

  let options = FitOptions {
    epochs: args.epochs,
    learning_rate: args.learning_rate,
    ..FitOptions::default()
  };
  let now = std::time::Instant::now();
  let pipeline = LinearPipeline::fit(&train, &options)?;
  info!("训练完成，耗时: {:.2?}", now.elapsed());

  if !test.is_empty() {
    let predicted = pipeline.predict(&test.features)?;
    let correct = predicted
      .iter()
      .zip(test.labels.iter())
      .filter(|(a, b)| a == b)
      .count();
    info!("测试集准确率: {:.4}", correct as f64 / test.len() as f64);
  }

  let onnx_path = args.output_dir.join(format!("{}.onnx", args.model_name));
  save_onnx(&to_onnx(&pipeline), &onnx_path)?;
  let path = args.output_dir.join(format!("{}.json", args.model_name));
  pipeline.save(&path)?;

  Ok(())
}

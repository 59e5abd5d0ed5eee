// 该文件是 Fengfan （风帆） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 转换、一致性校验与延迟基准
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

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use fengfan::{
  dataset::Dataset,
  model::{FitOptions, LinearPipeline, OnnxClassifier, to_onnx},
  output::OutputWrapper,
  task::{
    BenchmarkTask, ConsistencyCheck, DEFAULT_MAX_EXPONENT, DEFAULT_TOLERANCE, MAX_EXPONENT_LIMIT, Task,
  },
};

/// Fengfan 基准测试参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 已训练的流水线文件；缺省时现场训练
  #[arg(long, value_name = "FILE")]
  pub pipeline: Option<PathBuf>,
  /// 已转换的 ONNX 模型文件；缺省时在内存中转换流水线
  #[arg(long, value_name = "FILE")]
  pub onnx: Option<PathBuf>,
  /// 报告输出，例如 json:///tmp/reports/ ；缺省时打印到控制台
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  #[arg(long, default_value_t = 1500)]
  pub samples: usize,
  #[arg(long, default_value_t = 4)]
  pub features: usize,
  #[arg(long, default_value_t = 3)]
  pub classes: usize,
  #[arg(long, default_value_t = 42)]
  pub seed: u64,
  #[arg(long, default_value_t = 0.2)]
  pub test_ratio: f32,
  /// 每个批大小的重复次数
  #[arg(long, default_value_t = 100)]
  pub repeat: usize,
  /// 最大批大小为 2^max_exponent
  #[arg(long, default_value_t = DEFAULT_MAX_EXPONENT,
    value_parser = clap::value_parser!(u32).range(0..=MAX_EXPONENT_LIMIT as i64))]
  pub max_exponent: u32,
  /// 概率绝对容差
  #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
  pub tolerance: f32,
  /// 一致性校验失败时以错误退出
  #[arg(long, default_value_t = false)]
  pub strict: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let dataset = Dataset::blobs(args.samples, args.features, args.classes, args.seed);
  let (train, test) = dataset.train_test_split(args.test_ratio, args.seed);

  let pipeline = match &args.pipeline {
    Some(path) => LinearPipeline::load(path)?,
    None => {
      info!("未指定流水线文件，现场训练...");
      LinearPipeline::fit(&train, &FitOptions::default())?
    }
  };
  if pipeline.n_features() != test.n_features() {
    bail!(
      "流水线特征数 {} 与测试数据特征数 {} 不一致",
      pipeline.n_features(),
      test.n_features()
    );
  }

  let now = std::time::Instant::now();
  let onnx = match &args.onnx {
    Some(path) => OnnxClassifier::from_path(path)?,
    None => {
      info!("转换为 ONNX 模型...");
      OnnxClassifier::from_proto(&to_onnx(&pipeline))?
    }
  };
  info!("ONNX 后端就绪，耗时: {:.2?}", now.elapsed());

  let report = ConsistencyCheck::default()
    .with_tolerance(args.tolerance)
    .run_task(
      &test,
      (&pipeline, &onnx),
      OutputWrapper::from_optional_url(args.output.as_ref())?,
    )?;

  BenchmarkTask::default()
    .with_repeat(args.repeat)
    .with_max_exponent(args.max_exponent)
    .run_task(
      &test,
      (&pipeline, &onnx),
      OutputWrapper::from_optional_url(args.output.as_ref())?,
    )?;

  if !report.passed {
    warn!("两个后端结果不一致");
    if args.strict {
      bail!("一致性校验未通过");
    }
  }

  Ok(())
}

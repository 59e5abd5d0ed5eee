// 该文件是 Fengfan （风帆） 项目的一部分。
// src/task.rs - 一致性校验与延迟基准任务
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

use std::{
  collections::BTreeMap,
  time::{Duration, Instant},
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{dataset::Dataset, model::Classifier, output::Render};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("后端 {0} 推理失败: {1}")]
  BackendError(String, BoxError),
  #[error("输出失败: {0}")]
  RenderError(BoxError),
  #[error("两个后端输出形状不一致: {0:?} vs {1:?}")]
  ShapeMismatch((usize, usize), (usize, usize)),
  #[error("测试集为空")]
  EmptyDataset,
}

fn backend_error<C: Classifier>(backend: &C, e: C::Error) -> TaskError {
  TaskError::BackendError(backend.name().to_string(), Box::new(e))
}

fn render<R, O>(output: &O, result: &R) -> Result<(), TaskError>
where
  O: Render<R>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  output
    .render_result(result)
    .map_err(|e| TaskError::RenderError(Box::new(e)))
}

/// 两个后端在同一测试集上的一致性结果
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
  pub backends: [String; 2],
  pub samples: usize,
  pub label_match: f64,
  pub max_abs_diff: f32,
  pub tolerance: f32,
  pub passed: bool,
}

/// 比较预测标签与概率向量：标签必须完全一致，概率在绝对容差内相等
#[derive(Debug, Clone)]
pub struct ConsistencyCheck {
  tolerance: f32,
}

pub const DEFAULT_TOLERANCE: f32 = 1e-5;

impl Default for ConsistencyCheck {
  fn default() -> Self {
    Self {
      tolerance: DEFAULT_TOLERANCE,
    }
  }
}

impl ConsistencyCheck {
  pub fn with_tolerance(mut self, tolerance: f32) -> Self {
    self.tolerance = tolerance;
    self
  }

  pub fn check<A: Classifier, B: Classifier>(
    &self,
    dataset: &Dataset,
    first: &A,
    second: &B,
  ) -> Result<ConsistencyReport, TaskError> {
    if dataset.is_empty() {
      return Err(TaskError::EmptyDataset);
    }

    let proba_a = first
      .predict_proba(&dataset.features)
      .map_err(|e| backend_error(first, e))?;
    let proba_b = second
      .predict_proba(&dataset.features)
      .map_err(|e| backend_error(second, e))?;
    if proba_a.dim() != proba_b.dim() {
      return Err(TaskError::ShapeMismatch(proba_a.dim(), proba_b.dim()));
    }

    let labels_a = first
      .predict(&dataset.features)
      .map_err(|e| backend_error(first, e))?;
    let labels_b = second
      .predict(&dataset.features)
      .map_err(|e| backend_error(second, e))?;
    let matched = labels_a
      .iter()
      .zip(labels_b.iter())
      .filter(|(a, b)| a == b)
      .count();
    let label_match = matched as f64 / dataset.len() as f64;

    let max_abs_diff = proba_a
      .iter()
      .zip(proba_b.iter())
      .map(|(a, b)| (a - b).abs())
      .fold(0f32, f32::max);

    let passed = matched == dataset.len() && max_abs_diff <= self.tolerance;
    debug!(
      "一致性: 标签匹配 {}/{}, 最大概率差 {:e}",
      matched,
      dataset.len(),
      max_abs_diff
    );

    Ok(ConsistencyReport {
      backends: [first.name().to_string(), second.name().to_string()],
      samples: dataset.len(),
      label_match,
      max_abs_diff,
      tolerance: self.tolerance,
      passed,
    })
  }
}

impl<'a, A, B, O> Task<&'a Dataset, (&'a A, &'a B), O> for ConsistencyCheck
where
  A: Classifier,
  B: Classifier,
  O: Render<ConsistencyReport>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = ConsistencyReport;
  type Error = TaskError;

  fn run_task(
    self,
    input: &'a Dataset,
    (first, second): (&'a A, &'a B),
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始一致性校验...");
    let report = self.check(input, first, second)?;
    if report.passed {
      info!("一致性校验通过");
    } else {
      warn!(
        "一致性校验未通过: 标签匹配率 {:.4}, 最大概率差 {:e}",
        report.label_match, report.max_abs_diff
      );
    }
    render(&output, &report)?;
    Ok(report)
  }
}

/// 某个批大小下两个后端的平均单次调用延迟（秒）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct LatencyPair {
  pub first: f64,
  pub second: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkTable {
  pub backends: [String; 2],
  pub repeat: usize,
  pub rows: BTreeMap<usize, LatencyPair>,
}

/// 对 `2^0 .. 2^max_exponent` 的批大小分别重复计时两个后端
#[derive(Debug, Clone)]
pub struct BenchmarkTask {
  repeat: usize,
  max_exponent: u32,
}

pub const DEFAULT_REPEAT: usize = 100;
pub const DEFAULT_MAX_EXPONENT: u32 = 11;
/// 最大批大小 2^20
pub const MAX_EXPONENT_LIMIT: u32 = 20;

impl Default for BenchmarkTask {
  fn default() -> Self {
    Self {
      repeat: DEFAULT_REPEAT,
      max_exponent: DEFAULT_MAX_EXPONENT,
    }
  }
}

impl BenchmarkTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }

  pub fn with_max_exponent(mut self, max_exponent: u32) -> Self {
    if max_exponent > MAX_EXPONENT_LIMIT {
      warn!(
        "最大指数 {} 超过上限，使用 {}",
        max_exponent, MAX_EXPONENT_LIMIT
      );
    }
    self.max_exponent = max_exponent.min(MAX_EXPONENT_LIMIT);
    self
  }

  pub fn batch_sizes(&self) -> impl Iterator<Item = usize> {
    (0..=self.max_exponent).map_while(|e| 1usize.checked_shl(e))
  }

  fn mean_latency<C: Classifier>(
    &self,
    backend: &C,
    batch: &tract_onnx::prelude::tract_ndarray::Array2<f32>,
  ) -> Result<Duration, TaskError> {
    let mut times = Vec::with_capacity(self.repeat);
    for _ in 0..self.repeat {
      let now = Instant::now();
      backend
        .predict_proba(batch)
        .map_err(|e| backend_error(backend, e))?;
      times.push(now.elapsed());
    }
    Ok(times.iter().sum::<Duration>() / times.len() as u32)
  }

  pub fn measure<A: Classifier, B: Classifier>(
    &self,
    dataset: &Dataset,
    first: &A,
    second: &B,
  ) -> Result<BenchmarkTable, TaskError> {
    if dataset.is_empty() {
      return Err(TaskError::EmptyDataset);
    }

    let mut rows = BTreeMap::new();
    for batch_size in self.batch_sizes() {
      let batch = dataset.tiled(batch_size);
      let a = self.mean_latency(first, &batch)?;
      let b = self.mean_latency(second, &batch)?;
      info!(
        "批大小 {:>5}: {} {:.2?} / {} {:.2?}",
        batch_size,
        first.name(),
        a,
        second.name(),
        b
      );
      rows.insert(
        batch_size,
        LatencyPair {
          first: a.as_secs_f64(),
          second: b.as_secs_f64(),
        },
      );
    }

    Ok(BenchmarkTable {
      backends: [first.name().to_string(), second.name().to_string()],
      repeat: self.repeat,
      rows,
    })
  }
}

impl<'a, A, B, O> Task<&'a Dataset, (&'a A, &'a B), O> for BenchmarkTask
where
  A: Classifier,
  B: Classifier,
  O: Render<BenchmarkTable>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = BenchmarkTable;
  type Error = TaskError;

  fn run_task(
    self,
    input: &'a Dataset,
    (first, second): (&'a A, &'a B),
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!(
      "开始基准测试: 批大小 1..={}, 每个批大小重复 {} 次",
      1usize << self.max_exponent,
      self.repeat
    );
    let table = self.measure(input, first, second)?;
    render(&output, &table)?;
    info!("基准测试完成");
    Ok(table)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{cell::Cell, convert::Infallible, sync::Mutex};
  use tract_onnx::prelude::tract_ndarray::Array2;

  /// 统计调用次数的假后端，输出固定为第 `class` 类
  struct Counting {
    name: &'static str,
    class: usize,
    offset: f32,
    calls: Cell<usize>,
    batches: Mutex<Vec<usize>>,
  }

  impl Counting {
    fn new(name: &'static str, class: usize, offset: f32) -> Self {
      Self {
        name,
        class,
        offset,
        calls: Cell::new(0),
        batches: Mutex::new(Vec::new()),
      }
    }
  }

  impl Classifier for Counting {
    type Error = Infallible;

    fn name(&self) -> &str {
      self.name
    }

    fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      self.batches.lock().unwrap().push(features.nrows());
      let mut proba = Array2::from_elem((features.nrows(), 2), self.offset);
      for mut row in proba.rows_mut() {
        row[self.class] = 1.0 - self.offset;
      }
      Ok(proba)
    }
  }

  struct Collect<T>(Mutex<Vec<T>>);

  impl<T: Clone> Render<T> for &Collect<T> {
    type Error = Infallible;

    fn render_result(&self, result: &T) -> Result<(), Self::Error> {
      self.0.lock().unwrap().push(result.clone());
      Ok(())
    }
  }

  #[test]
  fn test_benchmark_covers_powers_of_two() {
    let dataset = Dataset::blobs(10, 3, 2, 0);
    let a = Counting::new("a", 0, 0.0);
    let b = Counting::new("b", 0, 0.0);
    let sink = Collect(Mutex::new(Vec::new()));

    let table = BenchmarkTask::default()
      .with_repeat(3)
      .run_task(&dataset, (&a, &b), &sink)
      .unwrap();

    let sizes: Vec<usize> = table.rows.keys().copied().collect();
    assert_eq!(
      sizes,
      [1, 2, 4, 8, 16, 32, 64, 128, 256, 512, 1024, 2048]
    );
    assert_eq!(a.calls.get(), 12 * 3);
    assert_eq!(b.calls.get(), 12 * 3);
    assert_eq!(a.batches.lock().unwrap()[..4], [1, 1, 1, 2]);
    assert_eq!(table.backends, ["a".to_string(), "b".to_string()]);
    assert_eq!(sink.0.lock().unwrap().len(), 1);
  }

  #[test]
  fn test_benchmark_default_settings() {
    let task = BenchmarkTask::default();
    assert_eq!(task.repeat, 100);
    assert_eq!(task.batch_sizes().last(), Some(2048));
  }

  #[test]
  fn test_max_exponent_is_capped() {
    let task = BenchmarkTask::default().with_max_exponent(64);
    assert_eq!(task.batch_sizes().count(), MAX_EXPONENT_LIMIT as usize + 1);
    assert_eq!(task.batch_sizes().last(), Some(1 << MAX_EXPONENT_LIMIT));

    let task = BenchmarkTask::default().with_max_exponent(3);
    assert_eq!(task.batch_sizes().collect::<Vec<_>>(), vec![1, 2, 4, 8]);
  }

  #[test]
  fn test_consistency_passes_within_tolerance() {
    let dataset = Dataset::blobs(16, 2, 2, 3);
    let a = Counting::new("a", 1, 0.0);
    let b = Counting::new("b", 1, 5e-6);

    let report = ConsistencyCheck::default().check(&dataset, &a, &b).unwrap();
    assert!(report.passed);
    assert_eq!(report.label_match, 1.0);
    assert_eq!(report.samples, 16);
  }

  #[test]
  fn test_consistency_fails_on_probability_drift() {
    let dataset = Dataset::blobs(16, 2, 2, 3);
    let a = Counting::new("a", 1, 0.0);
    let b = Counting::new("b", 1, 1e-3);

    let report = ConsistencyCheck::default().check(&dataset, &a, &b).unwrap();
    assert!(!report.passed);
    assert_eq!(report.label_match, 1.0);
    assert!(report.max_abs_diff > DEFAULT_TOLERANCE);
  }

  #[test]
  fn test_consistency_fails_on_label_mismatch() {
    let dataset = Dataset::blobs(8, 2, 2, 3);
    let a = Counting::new("a", 0, 0.0);
    let b = Counting::new("b", 1, 0.0);
    let sink = Collect(Mutex::new(Vec::new()));

    let report = ConsistencyCheck::default()
      .run_task(&dataset, (&a, &b), &sink)
      .unwrap();
    assert!(!report.passed);
    assert_eq!(report.label_match, 0.0);
    assert_eq!(sink.0.lock().unwrap().len(), 1);
  }

  #[test]
  fn test_empty_dataset_is_rejected() {
    let dataset = Dataset::blobs(0, 2, 2, 3);
    let a = Counting::new("a", 0, 0.0);
    assert!(matches!(
      ConsistencyCheck::default().check(&dataset, &a, &a),
      Err(TaskError::EmptyDataset)
    ));
    assert!(matches!(
      BenchmarkTask::default().measure(&dataset, &a, &a),
      Err(TaskError::EmptyDataset)
    ));
  }
}

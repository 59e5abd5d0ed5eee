// 该文件是 Fengfan （风帆） 项目的一部分。
// src/model/pipeline.rs - 标准化 + 多项逻辑回归分类流水线
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::tract_ndarray::{Array1, Array2, Axis};

use crate::{dataset::Dataset, model::Classifier};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerdeError(#[from] serde_json::Error),
  #[error("特征维度不匹配: 期望 {expected}, 实际 {actual}")]
  FeatureMismatch { expected: usize, actual: usize },
  #[error("数据集无效: {0}")]
  InvalidDataset(String),
  #[error("模型参数形状无效: {0}")]
  InvalidShape(String),
}

#[derive(Debug, Clone)]
pub struct FitOptions {
  pub epochs: usize,
  pub learning_rate: f32,
  pub l2: f32,
}

impl Default for FitOptions {
  fn default() -> Self {
    Self {
      epochs: 500,
      learning_rate: 0.5,
      l2: 1e-3,
    }
  }
}

/// 训练好的分类流水线：`softmax(((x - mean) / scale) · W + b)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPipeline {
  pub mean: Vec<f32>,
  pub scale: Vec<f32>,
  /// 形状 `[features][classes]`
  pub weights: Vec<Vec<f32>>,
  pub bias: Vec<f32>,
}

impl LinearPipeline {
  pub fn n_features(&self) -> usize {
    self.mean.len()
  }

  pub fn n_classes(&self) -> usize {
    self.bias.len()
  }

  pub fn fit(dataset: &Dataset, options: &FitOptions) -> Result<Self, PipelineError> {
    let (n, d) = dataset.features.dim();
    let k = dataset.n_classes;
    if n == 0 || d == 0 || k < 2 {
      return Err(PipelineError::InvalidDataset(format!(
        "样本数 {}, 特征数 {}, 类别数 {}",
        n, d, k
      )));
    }
    if let Some(&label) = dataset.labels.iter().find(|&&l| l >= k) {
      return Err(PipelineError::InvalidDataset(format!(
        "标签 {} 超出类别数 {}",
        label, k
      )));
    }

    info!("拟合标准化器: {} 个样本, {} 个特征", n, d);
    let mean = dataset
      .features
      .mean_axis(Axis(0))
      .unwrap_or_else(|| Array1::zeros(d));
    let scale = dataset
      .features
      .std_axis(Axis(0), 0.0)
      .mapv(|s| if s > f32::EPSILON { s } else { 1.0 });
    let scaled = (&dataset.features - &mean) / &scale;

    let mut onehot = Array2::<f32>::zeros((n, k));
    for (row, &label) in dataset.labels.iter().enumerate() {
      onehot[[row, label]] = 1.0;
    }

    info!(
      "训练逻辑回归: {} 轮, 学习率 {}, L2 {}",
      options.epochs, options.learning_rate, options.l2
    );
    let mut weights = Array2::<f32>::zeros((d, k));
    let mut bias = Array1::<f32>::zeros(k);
    for epoch in 0..options.epochs {
      let proba = softmax_rows(scaled.dot(&weights) + &bias);
      let grad = proba - &onehot;
      let grad_w = scaled.t().dot(&grad) / n as f32 + &weights * options.l2;
      let grad_b = grad.sum_axis(Axis(0)) / n as f32;
      weights = weights - grad_w * options.learning_rate;
      bias = bias - grad_b * options.learning_rate;

      if epoch % 100 == 0 {
        debug!("第 {} 轮, 偏置 {:?}", epoch, bias);
      }
    }

    Ok(LinearPipeline {
      mean: mean.to_vec(),
      scale: scale.to_vec(),
      weights: weights.rows().into_iter().map(|r| r.to_vec()).collect(),
      bias: bias.to_vec(),
    })
  }

  /// 检查参数形状：`mean`、`scale`、`weights` 行数一致，每行长度等于类别数且至少两类
  pub fn validate(&self) -> Result<(), PipelineError> {
    let d = self.n_features();
    let k = self.n_classes();
    if d == 0 || k < 2 {
      return Err(PipelineError::InvalidShape(format!(
        "特征数 {}, 类别数 {}",
        d, k
      )));
    }
    if self.scale.len() != d || self.weights.len() != d {
      return Err(PipelineError::InvalidShape(format!(
        "mean 长度 {}, scale 长度 {}, weights 行数 {}",
        d,
        self.scale.len(),
        self.weights.len()
      )));
    }
    if let Some((i, row)) = self.weights.iter().enumerate().find(|(_, r)| r.len() != k) {
      return Err(PipelineError::InvalidShape(format!(
        "weights 第 {} 行长度 {}, 期望 {}",
        i,
        row.len(),
        k
      )));
    }
    Ok(())
  }

  pub fn weight_matrix(&self) -> Array2<f32> {
    let d = self.n_features();
    let k = self.n_classes();
    Array2::from_shape_fn((d, k), |(i, j)| self.weights[i][j])
  }

  pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(file, self)?;
    info!("保存模型到文件: {}", path.display());
    Ok(())
  }

  pub fn load(path: &Path) -> Result<Self, PipelineError> {
    let file = std::fs::File::open(path)?;
    let pipeline: LinearPipeline = serde_json::from_reader(file)?;
    pipeline.validate()?;
    info!(
      "加载模型文件: {} ({} 个特征, {} 个类别)",
      path.display(),
      pipeline.n_features(),
      pipeline.n_classes()
    );
    Ok(pipeline)
  }
}

impl Classifier for LinearPipeline {
  type Error = PipelineError;

  fn name(&self) -> &str {
    "native"
  }

  fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>, Self::Error> {
    self.validate()?;
    if features.ncols() != self.n_features() {
      return Err(PipelineError::FeatureMismatch {
        expected: self.n_features(),
        actual: features.ncols(),
      });
    }
    let mean = Array1::from(self.mean.clone());
    let scale = Array1::from(self.scale.clone());
    let bias = Array1::from(self.bias.clone());
    let scaled = (features - &mean) / &scale;
    Ok(softmax_rows(scaled.dot(&self.weight_matrix()) + &bias))
  }
}

/// 按行做数值稳定的 softmax
pub(crate) fn softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
  for mut row in logits.rows_mut() {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|v| v / sum);
  }
  logits
}

// 该文件是 Fengfan （风帆） 项目的一部分。
// src/dataset.rs - 表格分类数据集
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

use rand::{
  SeedableRng,
  distributions::{Distribution, Uniform},
  rngs::StdRng,
  seq::SliceRandom,
};
use rand_distr::StandardNormal;
use tracing::debug;
use tract_onnx::prelude::tract_ndarray::{Array2, Axis};

/// 中心坐标的取值范围
const BLOB_CENTER_BOX: (f32, f32) = (-10.0, 10.0);
const BLOB_STD: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct Dataset {
  pub features: Array2<f32>,
  pub labels: Vec<usize>,
  pub n_classes: usize,
}

impl Dataset {
  /// 生成各向同性高斯团数据，每类一个中心，样本按类别轮流分配
  pub fn blobs(n_samples: usize, n_features: usize, n_classes: usize, seed: u64) -> Self {
    let mut rng = StdRng::seed_from_u64(seed);
    let center = Uniform::new(BLOB_CENTER_BOX.0, BLOB_CENTER_BOX.1);
    let classes = n_classes.max(1);
    let centers: Vec<Vec<f32>> = (0..classes)
      .map(|_| (0..n_features).map(|_| center.sample(&mut rng)).collect())
      .collect();

    let labels: Vec<usize> = (0..n_samples).map(|i| i % classes).collect();
    let mut features = Array2::<f32>::zeros((n_samples, n_features));
    for (i, &label) in labels.iter().enumerate() {
      for j in 0..n_features {
        let noise: f32 = StandardNormal.sample(&mut rng);
        features[[i, j]] = centers[label][j] + BLOB_STD * noise;
      }
    }
    debug!(
      "生成数据集: {} 个样本, {} 个特征, {} 个类别",
      n_samples, n_features, n_classes
    );

    Dataset {
      features,
      labels,
      n_classes: classes,
    }
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn n_features(&self) -> usize {
    self.features.ncols()
  }

  pub fn select(&self, indices: &[usize]) -> Dataset {
    Dataset {
      features: self.features.select(Axis(0), indices),
      labels: indices.iter().map(|&i| self.labels[i]).collect(),
      n_classes: self.n_classes,
    }
  }

  /// 打乱后按比例切分为 (训练集, 测试集)
  pub fn train_test_split(&self, test_ratio: f32, seed: u64) -> (Dataset, Dataset) {
    let mut indices: Vec<usize> = (0..self.len()).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((self.len() as f32) * test_ratio.clamp(0.0, 1.0)).round() as usize;
    let (test, train) = indices.split_at(n_test);
    (self.select(train), self.select(test))
  }

  /// 循环复制样本行，得到正好 `rows` 行的输入
  pub fn tiled(&self, rows: usize) -> Array2<f32> {
    if self.is_empty() {
      return Array2::zeros((rows, self.n_features()));
    }
    let indices: Vec<usize> = (0..rows).map(|i| i % self.len()).collect();
    self.features.select(Axis(0), &indices)
  }
}

// 该文件是 Fengfan （风帆） 项目的一部分。
// src/model/onnx_tabular.rs - ONNX 表格分类后端
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

use tracing::{debug, info};
use tract_onnx::{
  pb::ModelProto,
  prelude::{tract_ndarray::Array2, *},
};

use crate::model::{Classifier, OnnxModelError, onnx_image::TractRunnableModel};

/// 由 tract 执行的 ONNX 概率输出分类器，批维度可变
pub struct OnnxClassifier {
  plan: TractRunnableModel,
}

impl OnnxClassifier {
  pub fn from_proto(proto: &ModelProto) -> Result<Self, OnnxModelError> {
    info!("从内存中的 ONNX 模型创建推理计划");
    let plan = tract_onnx::onnx()
      .model_for_proto_model(proto)?
      .into_optimized()?
      .into_runnable()?;
    Ok(Self { plan })
  }

  pub fn from_path(path: &Path) -> Result<Self, OnnxModelError> {
    info!("加载模型文件: {}", path.display());
    let plan = tract_onnx::onnx()
      .model_for_path(path)?
      .into_optimized()?
      .into_runnable()?;
    Ok(Self { plan })
  }
}

impl Classifier for OnnxClassifier {
  type Error = OnnxModelError;

  fn name(&self) -> &str {
    "onnx"
  }

  fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>, Self::Error> {
    debug!("ONNX 推理: 输入形状 {:?}", features.dim());
    let tensor = Tensor::from(features.clone());
    let outputs = self.plan.run(tvec!(tensor.into()))?;
    let proba = outputs[0]
      .to_array_view::<f32>()?
      .into_dimensionality::<tract_ndarray::Ix2>()?
      .to_owned();
    Ok(proba)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    dataset::Dataset,
    model::{FitOptions, LinearPipeline, save_onnx, to_onnx},
  };

  #[test]
  fn test_converted_pipeline_matches_native() {
    let dataset = Dataset::blobs(200, 5, 4, 11);
    let (train, test) = dataset.train_test_split(0.25, 11);
    let pipeline = LinearPipeline::fit(&train, &FitOptions::default()).unwrap();
    let onnx = OnnxClassifier::from_proto(&to_onnx(&pipeline)).unwrap();

    let native = pipeline.predict_proba(&test.features).unwrap();
    let converted = onnx.predict_proba(&test.features).unwrap();
    assert_eq!(native.dim(), converted.dim());
    for (a, b) in native.iter().zip(converted.iter()) {
      assert!((a - b).abs() <= 1e-5, "{} vs {}", a, b);
    }
    assert_eq!(
      pipeline.predict(&test.features).unwrap(),
      onnx.predict(&test.features).unwrap()
    );
  }

  #[test]
  fn test_batch_dimension_is_dynamic() {
    let dataset = Dataset::blobs(64, 3, 2, 3);
    let pipeline = LinearPipeline::fit(&dataset, &FitOptions::default()).unwrap();
    let onnx = OnnxClassifier::from_proto(&to_onnx(&pipeline)).unwrap();

    for rows in [1usize, 7, 64] {
      let batch = dataset.tiled(rows);
      let proba = onnx.predict_proba(&batch).unwrap();
      assert_eq!(proba.dim(), (rows, 2));
    }
  }

  #[test]
  fn test_saved_onnx_file_matches_native() {
    let dataset = Dataset::blobs(240, 4, 3, 5);
    let (train, test) = dataset.train_test_split(0.25, 5);
    let pipeline = LinearPipeline::fit(&train, &FitOptions::default()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outputs").join("blobs-classifier.onnx");
    save_onnx(&to_onnx(&pipeline), &path).unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    let onnx = OnnxClassifier::from_path(&path).unwrap();
    let native = pipeline.predict_proba(&test.features).unwrap();
    let loaded = onnx.predict_proba(&test.features).unwrap();
    assert_eq!(native.dim(), loaded.dim());
    for (a, b) in native.iter().zip(loaded.iter()) {
      assert!((a - b).abs() <= 1e-5, "{} vs {}", a, b);
    }
    assert_eq!(
      pipeline.predict(&test.features).unwrap(),
      onnx.predict(&test.features).unwrap()
    );
  }
}

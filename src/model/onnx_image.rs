// 该文件是 Fengfan （风帆） 项目的一部分。
// src/model/onnx_image.rs - ONNX 图像分类模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::marker::PhantomData;

use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::NormalizedNchwFrame,
  model::{ClassifyResult, Model, WithLabel, postprocess},
  url_to_path,
};

pub(crate) type TractRunnableModel =
  RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

#[derive(Error, Debug)]
pub enum OnnxModelError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("推理引擎错误: {0}")]
  TractError(#[from] TractError),
  #[error("张量形状错误: {0}")]
  ShapeError(#[from] tract_ndarray::ShapeError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出无法映射到标签，输出长度 {0}")]
  UnmappedOutput(usize),
}

pub struct OnnxImageModelBuilder<const W: u32, const H: u32> {
  model_path: String,
}

impl<const W: u32, const H: u32> FromUrlWithScheme for OnnxImageModelBuilder<W, H> {
  const SCHEME: &'static str = "onnx";
}

impl<const W: u32, const H: u32> FromUrl for OnnxImageModelBuilder<W, H> {
  type Error = OnnxModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(OnnxImageModelBuilder {
      model_path: url_to_path(url),
    })
  }
}

impl<const W: u32, const H: u32> OnnxImageModelBuilder<W, H> {
  pub fn build<T>(self) -> Result<OnnxImageModel<W, H, T>, OnnxModelError> {
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 tract 推理计划");
    let plan = tract_onnx::onnx()
      .model_for_read(&mut model_data.as_slice())?
      .with_input_fact(0, f32::fact([1, 3, H as usize, W as usize]).into())?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成");

    Ok(OnnxImageModel {
      plan,
      _phantom: PhantomData,
    })
  }
}

/// 输入 `[1, 3, H, W]` 归一化张量，输出类别分数的图像分类模型
pub struct OnnxImageModel<const W: u32, const H: u32, T> {
  plan: TractRunnableModel,
  _phantom: PhantomData<T>,
}

impl<const W: u32, const H: u32, T: WithLabel> Model for OnnxImageModel<W, H, T> {
  type Input = NormalizedNchwFrame<W, H>;
  type Output = ClassifyResult<T>;
  type Error = OnnxModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let tensor: Tensor =
      tract_ndarray::Array4::from_shape_vec(input.shape(), input.as_slice().to_vec())?.into();

    debug!("执行模型推理");
    let outputs = self.plan.run(tvec!(tensor.into()))?;

    let scores: Vec<f32> = outputs[0].to_array_view::<f32>()?.iter().copied().collect();
    debug!("模型推理结果：{:?}", scores);

    postprocess(&scores).ok_or(OnnxModelError::UnmappedOutput(scores.len()))
  }
}

// 该文件是 Fengfan （风帆） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tract_onnx::prelude::tract_ndarray::Array2;

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 批量表格分类器：输入 `[n, d]`，输出每行的类别概率 `[n, k]`
pub trait Classifier {
  type Error: std::error::Error + Send + Sync + 'static;

  fn name(&self) -> &str;
  fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>, Self::Error>;

  fn predict(&self, features: &Array2<f32>) -> Result<Vec<usize>, Self::Error> {
    let proba = self.predict_proba(features)?;
    Ok(
      proba
        .rows()
        .into_iter()
        .map(|row| argmax(row.iter().copied()).unwrap_or(0))
        .collect(),
    )
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: u32) -> Option<Self>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyResult<T> {
  pub kind: T,
  pub index: usize,
  pub score: f32,
}

/// 运动场景八分类标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SportLabel {
  Badminton,
  Bocce,
  Croquet,
  Polo,
  RockClimbing,
  Rowing,
  Sailing,
  Snowboarding,
}

impl SportLabel {
  pub const ALL: [SportLabel; 8] = [
    SportLabel::Badminton,
    SportLabel::Bocce,
    SportLabel::Croquet,
    SportLabel::Polo,
    SportLabel::RockClimbing,
    SportLabel::Rowing,
    SportLabel::Sailing,
    SportLabel::Snowboarding,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      SportLabel::Badminton => "badminton",
      SportLabel::Bocce => "bocce",
      SportLabel::Croquet => "croquet",
      SportLabel::Polo => "polo",
      SportLabel::RockClimbing => "rockclimbing",
      SportLabel::Rowing => "rowing",
      SportLabel::Sailing => "sailing",
      SportLabel::Snowboarding => "snowboarding",
    }
  }
}

impl WithLabel for SportLabel {
  fn to_label_str(&self) -> String {
    self.as_str().to_string()
  }

  fn from_label_id(id: u32) -> Option<Self> {
    Self::ALL.get(id as usize).copied()
  }
}

/// 取最大值下标，相等时取第一个；NaN 不参与比较
pub fn argmax<I: IntoIterator<Item = f32>>(scores: I) -> Option<usize> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, score) in scores.into_iter().enumerate() {
    match best {
      None if !score.is_nan() => best = Some((idx, score)),
      Some((_, max)) if score > max => best = Some((idx, score)),
      _ => {}
    }
  }
  best.map(|(idx, _)| idx)
}

/// 将模型输出分数映射为标签
pub fn postprocess<T: WithLabel>(scores: &[f32]) -> Option<ClassifyResult<T>> {
  let index = argmax(scores.iter().copied())?;
  let kind = T::from_label_id(index as u32)?;
  Some(ClassifyResult {
    kind,
    index,
    score: scores[index],
  })
}

mod convert;
mod onnx_image;
mod onnx_tabular;
mod pipeline;

pub use self::convert::{CONVERTED_INPUT_NAME, CONVERTED_OUTPUT_NAME, save_onnx, to_onnx};
pub use self::onnx_image::{OnnxImageModel, OnnxImageModelBuilder, OnnxModelError};
pub use self::onnx_tabular::OnnxClassifier;
pub use self::pipeline::{FitOptions, LinearPipeline, PipelineError};

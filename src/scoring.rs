// 该文件是 Fengfan （风帆） 项目的一部分。
// src/scoring.rs - 评分请求处理
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

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl,
  frame::{NormalizedNchwFrame, Preprocess},
  input::{FetchImage, InputWrapper},
  model::{ClassifyResult, Model, OnnxImageModel, OnnxImageModelBuilder, SportLabel, WithLabel},
};

/// 模型输入边长
pub const SCORING_INPUT_SIZE: u32 = 224;

pub type ScoringFrame = NormalizedNchwFrame<SCORING_INPUT_SIZE, SCORING_INPUT_SIZE>;
pub type ScoringModel = OnnxImageModel<SCORING_INPUT_SIZE, SCORING_INPUT_SIZE, SportLabel>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 评分请求：`{"data": ["<image url>"]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
  pub data: Vec<String>,
}

impl ScoreRequest {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      data: vec![url.into()],
    }
  }
}

/// 评分响应，只会是成功与失败两种形状之一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreResponse {
  Success { result: String, time: f64 },
  Failure { error: String },
}

impl ScoreResponse {
  pub fn is_success(&self) -> bool {
    matches!(self, ScoreResponse::Success { .. })
  }
}

#[derive(Error, Debug)]
pub enum ScoringError {
  #[error("请求格式错误: {0}")]
  InvalidRequest(#[from] serde_json::Error),
  #[error("请求中没有图像 URL")]
  EmptyData,
  #[error("图像 URL 无效: {0}")]
  InvalidUrl(#[from] url::ParseError),
  #[error("获取图像失败: {0}")]
  FetchError(BoxError),
  #[error("推理失败: {0}")]
  InferenceError(BoxError),
  #[error("模型初始化失败: {0}")]
  InitError(BoxError),
}

/// 评分处理器：`init` 一次性加载模型，`run` 反复处理请求
pub struct Scorer<F, M> {
  fetcher: F,
  model: M,
  preprocess: Preprocess,
}

impl Scorer<InputWrapper, ScoringModel> {
  /// 加载 `onnx://` 模型并准备图像来源
  pub fn init(model_url: &Url, preprocess: Preprocess) -> Result<Self, ScoringError> {
    info!("初始化评分处理器, 模型: {}", model_url);
    let model: ScoringModel =
      OnnxImageModelBuilder::<SCORING_INPUT_SIZE, SCORING_INPUT_SIZE>::from_url(model_url)
        .and_then(|builder| builder.build())
        .map_err(|e| ScoringError::InitError(Box::new(e)))?;
    let fetcher = InputWrapper::new().map_err(|e| ScoringError::InitError(Box::new(e)))?;
    Ok(Scorer::new(fetcher, model, preprocess))
  }
}

impl<F, M, T> Scorer<F, M>
where
  F: FetchImage,
  M: Model<Input = ScoringFrame, Output = ClassifyResult<T>>,
  M::Error: std::error::Error + Send + Sync + 'static,
  T: WithLabel,
{
  pub fn new(fetcher: F, model: M, preprocess: Preprocess) -> Self {
    Self {
      fetcher,
      model,
      preprocess,
    }
  }

  /// 解析、下载、预处理、推理并映射标签；请求体按原始字节解析，非 UTF-8 也走错误响应
  pub fn score(&self, raw: &[u8]) -> Result<(T, Duration), ScoringError> {
    let now = Instant::now();
    let request: ScoreRequest = serde_json::from_slice(raw)?;
    let url = request.data.first().ok_or(ScoringError::EmptyData)?;
    let url = Url::parse(url)?;
    debug!("评分图像: {}", url);

    let image = self
      .fetcher
      .fetch(&url)
      .map_err(|e| ScoringError::FetchError(Box::new(e)))?;
    let frame: ScoringFrame = self.preprocess.apply(&image);
    let result = self
      .model
      .infer(&frame)
      .map_err(|e| ScoringError::InferenceError(Box::new(e)))?;

    let elapsed = now.elapsed();
    info!(
      "推理完成: {} ({:.2}), 耗时: {:.2?}",
      result.kind.to_label_str(),
      result.score,
      elapsed
    );
    Ok((result.kind, elapsed))
  }

  /// 任何失败都折叠为 `{"error": ...}`，不重试
  pub fn run(&self, raw: &[u8]) -> ScoreResponse {
    match self.score(raw) {
      Ok((label, elapsed)) => ScoreResponse::Success {
        result: label.to_label_str(),
        time: elapsed.as_secs_f64(),
      },
      Err(e) => {
        warn!("评分失败: {}", e);
        ScoreResponse::Failure {
          error: e.to_string(),
        }
      }
    }
  }
}

/// 可被 HTTP 服务共享的评分入口
pub trait ScoringService: Send + Sync + 'static {
  fn run(&self, raw: &[u8]) -> ScoreResponse;
}

impl<F, M, T> ScoringService for Scorer<F, M>
where
  F: FetchImage + Send + Sync + 'static,
  M: Model<Input = ScoringFrame, Output = ClassifyResult<T>> + Send + Sync + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
  T: WithLabel + 'static,
{
  fn run(&self, raw: &[u8]) -> ScoreResponse {
    Scorer::<F, M>::run(self, raw)
  }
}

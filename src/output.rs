// 该文件是 Fengfan （风帆） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use url::Url;

use crate::FromUrl;
#[cfg(feature = "json_report")]
use crate::FromUrlWithScheme;
use crate::task::{BenchmarkTable, ConsistencyReport};

pub trait Render<R>: Sized {
  type Error;
  fn render_result(&self, result: &R) -> Result<(), Self::Error>;
}

mod console;
pub use self::console::ConsoleOutput;

#[cfg(feature = "json_report")]
mod json_report;
#[cfg(feature = "json_report")]
pub use self::json_report::{JsonReportOutput, JsonReportOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "json_report")]
  #[error("JSON 报告输出错误: {0}")]
  JsonReportOutputError(#[from] JsonReportOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Console(ConsoleOutput),
  #[cfg(feature = "json_report")]
  JsonReport(JsonReportOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "json_report")]
      JsonReportOutput::SCHEME => {
        let output = JsonReportOutput::from_url(url)?;
        Ok(OutputWrapper::JsonReport(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl OutputWrapper {
  /// 未指定输出地址时打印到控制台
  pub fn from_optional_url(url: Option<&Url>) -> Result<Self, OutputError> {
    match url {
      Some(url) => Self::from_url(url),
      None => Ok(OutputWrapper::Console(ConsoleOutput)),
    }
  }
}

impl Render<BenchmarkTable> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &BenchmarkTable) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => match output.render_result(result) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      #[cfg(feature = "json_report")]
      OutputWrapper::JsonReport(output) => output
        .render_result(result)
        .map_err(OutputError::from),
    }
  }
}

impl Render<ConsistencyReport> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, result: &ConsistencyReport) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Console(output) => match output.render_result(result) {
        Ok(()) => Ok(()),
        Err(never) => match never {},
      },
      #[cfg(feature = "json_report")]
      OutputWrapper::JsonReport(output) => output
        .render_result(result)
        .map_err(OutputError::from),
    }
  }
}

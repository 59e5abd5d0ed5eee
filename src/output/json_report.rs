// 该文件是 Fengfan （风帆） 项目的一部分。
// src/output/json_report.rs - JSON 报告输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::Render,
  task::{BenchmarkTable, ConsistencyReport},
  url_to_path,
};

#[derive(Error, Debug)]
pub enum JsonReportOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerdeError(#[from] serde_json::Error),
}

/// 把结果写成 JSON 文件。
///
/// `json:///path/report.json` 直接写入该文件；
/// 以 `/` 结尾的路径视为目录，按 `<种类>-<时间>.json` 命名。
pub struct JsonReportOutput {
  path: PathBuf,
  directory: bool,
}

impl FromUrlWithScheme for JsonReportOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonReportOutput {
  type Error = JsonReportOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonReportOutputError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = url_to_path(uri);
    Ok(JsonReportOutput {
      directory: path.ends_with('/'),
      path: PathBuf::from(path),
    })
  }
}

impl JsonReportOutput {
  fn report_path(&self, kind: &str) -> PathBuf {
    if self.directory {
      let now = Utc::now();
      self
        .path
        .join(format!("{}-{}.json", kind, now.format("%Y%m%d-%H%M%S")))
    } else {
      self.path.clone()
    }
  }

  fn save<T: Serialize>(&self, kind: &str, value: &T) -> Result<(), JsonReportOutputError> {
    let path = self.report_path(kind);
    if let Some(parent) = Path::new(&path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(&path)?;
    serde_json::to_writer_pretty(file, value)?;
    warn!("保存报告到文件: {}", path.display());
    Ok(())
  }
}

impl Render<BenchmarkTable> for JsonReportOutput {
  type Error = JsonReportOutputError;

  fn render_result(&self, result: &BenchmarkTable) -> Result<(), Self::Error> {
    self.save("benchmark", result)
  }
}

impl Render<ConsistencyReport> for JsonReportOutput {
  type Error = JsonReportOutputError;

  fn render_result(&self, result: &ConsistencyReport) -> Result<(), Self::Error> {
    self.save("consistency", result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn report() -> ConsistencyReport {
    ConsistencyReport {
      backends: ["native".to_string(), "onnx".to_string()],
      samples: 4,
      label_match: 1.0,
      max_abs_diff: 0.0,
      tolerance: 1e-5,
      passed: true,
    }
  }

  #[test]
  fn test_writes_to_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("report.json");
    let url = Url::parse(&format!("json://{}", path.display())).unwrap();

    let output = JsonReportOutput::from_url(&url).unwrap();
    output.render_result(&report()).unwrap();

    let value: serde_json::Value =
      serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(value["passed"], true);
    assert_eq!(value["backends"][1], "onnx");
  }

  #[test]
  fn test_directory_path_gets_timestamped_name() {
    let dir = tempfile::tempdir().unwrap();
    let url = Url::parse(&format!("json://{}/", dir.path().display())).unwrap();

    let output = JsonReportOutput::from_url(&url).unwrap();
    output.render_result(&report()).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("consistency-") && names[0].ends_with(".json"));
  }

  #[test]
  fn test_rejects_other_schemes() {
    let url = Url::parse("file:///tmp/report.json").unwrap();
    assert!(matches!(
      JsonReportOutput::from_url(&url),
      Err(JsonReportOutputError::SchemeMismatch(_))
    ));
  }
}

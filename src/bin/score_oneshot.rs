// 该文件是 Fengfan （风帆） 项目的一部分。
// src/bin/score_oneshot.rs - 向评分服务发送一次请求
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use fengfan::scoring::{ScoreRequest, ScoreResponse};

/// Fengfan 评分客户端参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 评分服务地址，例如 http://localhost:5001/score
  #[arg(long, value_name = "SERVICE")]
  pub service: Url,
  /// 待评分图像 URL
  #[arg(long, value_name = "IMAGE")]
  pub image: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("评分服务: {}", args.service);
  info!("图像地址: {}", args.image);

  let request = ScoreRequest::new(args.image.as_str());
  let now = std::time::Instant::now();
  let response: ScoreResponse = reqwest::blocking::Client::new()
    .post(args.service)
    .json(&request)
    .send()?
    .error_for_status()?
    .json()?;
  let elapsed = now.elapsed();
  info!("请求完成，耗时: {:.2?}", elapsed);

  match &response {
    ScoreResponse::Success { result, time } => {
      info!("预测标签: {}, 服务端耗时: {:.4}s", result, time)
    }
    ScoreResponse::Failure { error } => warn!("评分失败: {}", error),
  }
  println!("{}", serde_json::to_string(&response)?);

  Ok(())
}

// 该文件是 Fengfan （风帆） 项目的一部分。
// src/server.rs - HTTP 评分服务
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

use std::{future::Future, net::SocketAddr, sync::Arc};

use axum::{
  Json, Router,
  body::Bytes,
  extract::{State, rejection::BytesRejection},
  routing::{get, post},
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::scoring::{ScoreResponse, ScoringService};

/// 构建评分服务路由：`POST /score` 与 `GET /`
pub fn router<S: ScoringService>(scorer: Arc<S>) -> Router {
  Router::new()
    .route("/", get(health_check))
    .route("/score", post(handle_score::<S>))
    .with_state(scorer)
}

/// 监听地址并提供服务，直到 `shutdown` 完成
pub async fn serve<S, F>(scorer: Arc<S>, addr: SocketAddr, shutdown: F) -> std::io::Result<()>
where
  S: ScoringService,
  F: Future<Output = ()> + Send + 'static,
{
  let listener = TcpListener::bind(addr).await?;
  info!("评分服务监听: {}", addr);
  axum::serve(listener, router(scorer))
    .with_graceful_shutdown(shutdown)
    .await?;
  info!("评分服务已停止");
  Ok(())
}

async fn health_check() -> &'static str {
  "Healthy"
}

/// 请求体读取失败（超出大小限制等）同样返回 `{"error": ...}`
async fn handle_score<S: ScoringService>(
  State(scorer): State<Arc<S>>,
  body: Result<Bytes, BytesRejection>,
) -> Json<ScoreResponse> {
  let body = match body {
    Ok(body) => body,
    Err(rejection) => {
      warn!("读取请求体失败: {}", rejection);
      return Json(ScoreResponse::Failure {
        error: format!("请求体无效: {}", rejection),
      });
    }
  };

  // 下载与推理均为阻塞操作
  let response = tokio::task::spawn_blocking(move || scorer.run(&body)).await;
  match response {
    Ok(response) => Json(response),
    Err(e) => {
      error!("评分任务异常退出: {}", e);
      Json(ScoreResponse::Failure {
        error: e.to_string(),
      })
    }
  }
}

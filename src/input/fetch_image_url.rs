// 该文件是 Fengfan （风帆） 项目的一部分。
// src/input/fetch_image_url.rs - 通过 HTTP 下载图像
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

use std::{io::Read, time::Duration};

use image::RgbImage;
use reqwest::blocking::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::input::FetchImage;

const FETCH_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const FETCH_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// 单张图像下载上限 20 MiB
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum HttpImageFetcherError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("HTTP 请求错误: {0}")]
  RequestError(#[from] reqwest::Error),
  #[error("读取响应错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像超过大小上限 {0} 字节")]
  TooLarge(u64),
  #[error("图像解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
}

/// 通过 HTTP/HTTPS 下载图像并解码
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
  client: Client,
  max_bytes: u64,
}

impl HttpImageFetcher {
  pub fn new() -> Result<Self, HttpImageFetcherError> {
    let client = Client::builder()
      .connect_timeout(FETCH_CONNECT_TIMEOUT)
      .timeout(FETCH_REQUEST_TIMEOUT)
      .build()?;
    Ok(Self {
      client,
      max_bytes: DEFAULT_MAX_IMAGE_BYTES,
    })
  }

  pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  pub fn accepts(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
  }
}

impl FetchImage for HttpImageFetcher {
  type Error = HttpImageFetcherError;

  fn fetch(&self, url: &Url) -> Result<RgbImage, Self::Error> {
    if !Self::accepts(url) {
      return Err(HttpImageFetcherError::SchemeMismatch(
        url.scheme().to_string(),
      ));
    }

    debug!("下载图像: {}", url);
    let response = self.client.get(url.clone()).send()?.error_for_status()?;
    if let Some(length) = response.content_length()
      && length > self.max_bytes
    {
      warn!("图像声明大小 {} 字节超过上限", length);
      return Err(HttpImageFetcherError::TooLarge(self.max_bytes));
    }

    // 不信任声明长度，最多多读一个字节用于判断超限
    let mut bytes = Vec::new();
    response.take(self.max_bytes.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > self.max_bytes {
      return Err(HttpImageFetcherError::TooLarge(self.max_bytes));
    }
    debug!("图像大小: {} 字节", bytes.len());

    let image = image::load_from_memory(&bytes)?;
    Ok(image.to_rgb8())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{io::Cursor, net::SocketAddr};

  use axum::{Router, routing::get};
  use image::{ImageFormat, Rgb};
  use tokio::sync::oneshot;

  use crate::{
    frame::Preprocess,
    input::InputWrapper,
    scoring::{ScoreResponse, Scorer, tests::FixedScores},
  };

  fn png_bytes() -> Vec<u8> {
    let mut buffer = Vec::new();
    RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]))
      .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
      .unwrap();
    buffer
  }

  async fn spawn_image_server() -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
      .route("/boat.png", get(|| async { png_bytes() }))
      .route("/garbage.jpg", get(|| async { &b"definitely not an image"[..] }));

    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
      axum::serve(listener, app)
        .with_graceful_shutdown(async {
          let _ = rx.await;
        })
        .await
        .unwrap();
    });
    (addr, tx)
  }

  fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
  }

  #[test]
  fn test_rejects_non_http_scheme() {
    let fetcher = HttpImageFetcher::new().unwrap();
    let url = Url::parse("file:///tmp/boat.png").unwrap();
    assert!(matches!(
      fetcher.fetch(&url),
      Err(HttpImageFetcherError::SchemeMismatch(ref s)) if s == "file"
    ));
  }

  #[tokio::test]
  async fn test_fetch_error_paths() {
    let (addr, shutdown) = spawn_image_server().await;
    let refused = closed_port();

    tokio::task::spawn_blocking(move || {
      let fetcher = HttpImageFetcher::new().unwrap();
      let url = |path: &str| Url::parse(&format!("http://{}{}", addr, path)).unwrap();

      let image = fetcher.fetch(&url("/boat.png")).unwrap();
      assert_eq!(image.dimensions(), (40, 30));

      let err = fetcher.fetch(&url("/missing.png")).unwrap_err();
      match err {
        HttpImageFetcherError::RequestError(e) => {
          assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND))
        }
        other => panic!("unexpected error: {:?}", other),
      }

      assert!(matches!(
        fetcher.fetch(&url("/garbage.jpg")),
        Err(HttpImageFetcherError::DecodeError(_))
      ));

      let small = fetcher.clone().with_max_bytes(16);
      assert!(matches!(
        small.fetch(&url("/boat.png")),
        Err(HttpImageFetcherError::TooLarge(16))
      ));

      let refused = Url::parse(&format!("http://{}/boat.png", refused)).unwrap();
      match fetcher.fetch(&refused).unwrap_err() {
        HttpImageFetcherError::RequestError(e) => assert!(e.is_connect()),
        other => panic!("unexpected error: {:?}", other),
      }
    })
    .await
    .unwrap();

    let _ = shutdown.send(());
  }

  #[tokio::test]
  async fn test_scorer_over_http_reports_errors() {
    let (addr, shutdown) = spawn_image_server().await;
    let refused = closed_port();

    tokio::task::spawn_blocking(move || {
      let mut scores = vec![0.0; 8];
      scores[3] = 1.0;
      let scorer = Scorer::new(
        InputWrapper::new().unwrap(),
        FixedScores(scores),
        Preprocess::default(),
      );
      let request = |url: String| format!(r#"{{"data": ["{}"]}}"#, url).into_bytes();

      match scorer.run(&request(format!("http://{}/boat.png", addr))) {
        ScoreResponse::Success { result, .. } => assert_eq!(result, "polo"),
        other => panic!("unexpected response: {:?}", other),
      }

      for url in [
        format!("http://{}/garbage.jpg", addr),
        format!("http://{}/missing.png", addr),
        format!("http://{}/boat.png", refused),
      ] {
        let response = scorer.run(&request(url.clone()));
        assert!(!response.is_success(), "{} should fail", url);
      }
    })
    .await
    .unwrap();

    let _ = shutdown.send(());
  }
}

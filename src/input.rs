// 该文件是 Fengfan （风帆） 项目的一部分。
// src/input.rs - 图像输入
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

use image::RgbImage;
use thiserror::Error;
use url::Url;

/// 根据 URL 获取一张 RGB 图像
pub trait FetchImage {
  type Error: std::error::Error + Send + Sync + 'static;
  fn fetch(&self, url: &Url) -> Result<RgbImage, Self::Error>;
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileReader, ImageFileReaderError};

#[cfg(feature = "fetch_image_url")]
mod fetch_image_url;
#[cfg(feature = "fetch_image_url")]
pub use self::fetch_image_url::{DEFAULT_MAX_IMAGE_BYTES, HttpImageFetcher, HttpImageFetcherError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("读取图像文件错误: {0}")]
  ImageFileReaderError(#[from] ImageFileReaderError),
  #[cfg(feature = "fetch_image_url")]
  #[error("下载图像错误: {0}")]
  HttpImageFetcherError(#[from] HttpImageFetcherError),
  #[error("URI 方案不支持: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案分发到具体图像来源
pub struct InputWrapper {
  #[cfg(feature = "read_image_file")]
  file: ImageFileReader,
  #[cfg(feature = "fetch_image_url")]
  http: HttpImageFetcher,
}

impl InputWrapper {
  pub fn new() -> Result<Self, InputError> {
    Ok(Self {
      #[cfg(feature = "read_image_file")]
      file: ImageFileReader,
      #[cfg(feature = "fetch_image_url")]
      http: HttpImageFetcher::new()?,
    })
  }
}

impl FetchImage for InputWrapper {
  type Error = InputError;

  fn fetch(&self, url: &Url) -> Result<RgbImage, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileReader::SCHEME {
        return Ok(self.file.fetch(url)?);
      }
    }
    #[cfg(feature = "fetch_image_url")]
    {
      if HttpImageFetcher::accepts(url) {
        return Ok(self.http.fetch(url)?);
      }
    }
    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

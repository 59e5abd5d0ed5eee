// 该文件是 Fengfan （风帆） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::FetchImage, url_to_path};

#[derive(Error, Debug)]
pub enum ImageFileReaderError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 从本地文件读取图像，URL 形如 `file:///path/to/image.jpg`
#[derive(Debug, Default, Clone)]
pub struct ImageFileReader;

impl FromUrlWithScheme for ImageFileReader {
  const SCHEME: &'static str = "file";
}

impl FromUrl for ImageFileReader {
  type Error = ImageFileReaderError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileReaderError::SchemaMismatch);
    }
    Ok(ImageFileReader)
  }
}

impl FetchImage for ImageFileReader {
  type Error = ImageFileReaderError;

  fn fetch(&self, url: &Url) -> Result<RgbImage, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageFileReaderError::SchemaMismatch);
    }

    let path = url_to_path(url);
    debug!("读取图像文件: {}", path);
    let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
    Ok(image.to_rgb8())
  }
}

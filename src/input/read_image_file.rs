// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/input/read_image_file.rs - 单张图像文件输入
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

use std::path::Path;

use image::ImageReader;
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("读取图像 {path} 失败: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("解码图像 {path} 失败: {source}")]
  Decode {
    path: String,
    source: image::ImageError,
  },
}

/// 读取并解码一张图像，任何格式都转换为 RGB8
pub fn load_frame(index: u64, path: &Path) -> Result<Frame, ImageFileInputError> {
  let display = path.display().to_string();
  let reader = ImageReader::open(path).map_err(|source| ImageFileInputError::Io {
    path: display.clone(),
    source,
  })?;
  let reader = reader
    .with_guessed_format()
    .map_err(|source| ImageFileInputError::Io {
      path: display.clone(),
      source,
    })?;
  let image = reader.decode().map_err(|source| ImageFileInputError::Decode {
    path: display.clone(),
    source,
  })?;
  Ok(Frame::new(index, display, image.into_rgb8()))
}

/// `image:///path/to/file.jpg`，只产生一帧
pub struct ImageFileInput {
  frame: Option<Frame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let frame = load_frame(0, Path::new(url.path()))?;
    info!(
      "读取图像 {}: {}x{}",
      frame.source,
      frame.width(),
      frame.height()
    );
    Ok(ImageFileInput { frame: Some(frame) })
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

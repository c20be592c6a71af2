// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/output/save_image_file.rs - 保存标注图像
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

use std::{
  io::Cursor,
  path::{Path, PathBuf},
};

use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError},
  },
};

pub const DEFAULT_OUTPUT_PATH: &str = "output/result.jpg";

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(image::ImageError),
  #[error("绘制配置错误: {0}")]
  DrawError(#[from] DrawError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// `image:///path/to/result.jpg?font=/path/to/font.ttf`
///
/// 每帧都覆盖写入同一路径。路径为空时写到 `output/result.jpg`。
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = match uri.path() {
      "" | "/" => PathBuf::from(DEFAULT_OUTPUT_PATH),
      path => PathBuf::from(path),
    };

    let mut draw = Draw::default();
    for (key, value) in uri.query_pairs() {
      if key == "font" {
        draw = draw.with_font_file(value.as_ref())?;
      }
    }
    if !draw.has_font() {
      warn!(
        "{} 未配置字体 (?font=), 只绘制检测框, 不绘制标签文字与帧率",
        path.display()
      );
    }

    Ok(SaveImageFileOutput { path, draw })
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      path: path.into(),
      draw,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 是否会绘制标签文字与帧率
  pub fn draws_text(&self) -> bool {
    self.draw.has_font()
  }

  /// 绘制并按扩展名编码，不写文件
  pub fn encode(
    &self,
    frame: &Frame,
    result: &DetectResult,
  ) -> Result<Vec<u8>, SaveImageFileError> {
    let format = ImageFormat::from_path(&self.path).map_err(SaveImageFileError::ImageError)?;
    let image = self.draw.draw_detections(&frame.image, result);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
      .write_to(&mut Cursor::new(&mut bytes), format)
      .map_err(SaveImageFileError::ImageError)?;
    Ok(bytes)
  }

  pub fn save_encoded(&self, bytes: &[u8]) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent).map_err(SaveImageFileError::IoError)?;
    }

    std::fs::write(&self.path, bytes).map_err(SaveImageFileError::IoError)?;

    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render<Frame, DetectResult> for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let bytes = self.encode(frame, result)?;
    self.save_encoded(&bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::time::Duration;

  #[test]
  fn annotated_image_is_written_at_half_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.png");
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), path.as_path());

    let frame = Frame::new(0, "test", RgbImage::new(64, 48));
    let result = DetectResult {
      items: Box::new([]),
      image_size: (64, 48),
      inference_time: Duration::from_millis(5),
    };
    output.render_result(&frame, &result).unwrap();

    let saved = image::open(&path).unwrap();
    assert_eq!((saved.width(), saved.height()), (32, 24));
  }

  #[test]
  fn empty_path_uses_default() {
    let url = Url::parse("image:///").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert_eq!(output.path(), Path::new(DEFAULT_OUTPUT_PATH));
  }

  #[test]
  fn missing_font_disables_label_text() {
    let url = Url::parse("image:///tmp/out.jpg").unwrap();
    let output = SaveImageFileOutput::from_url(&url).unwrap();
    assert!(!output.draws_text());
  }

  #[test]
  fn unknown_extension_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out.unknownext");
    let output = SaveImageFileOutput::new(path.clone(), Draw::default());
    let frame = Frame::new(0, "test", RgbImage::new(8, 8));
    let result = DetectResult {
      items: Box::new([]),
      image_size: (8, 8),
      inference_time: Duration::ZERO,
    };
    assert!(matches!(
      output.render_result(&frame, &result),
      Err(SaveImageFileError::ImageError(_))
    ));
    assert!(!path.parent().unwrap().exists());
  }

  #[test]
  fn bad_font_aborts_construction() {
    let url = Url::parse("image:///tmp/out.jpg?font=/no/such/font.ttf").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::DrawError(_))
    ));
  }
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/input/folder.rs - 目录图像序列输入
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

use std::{collections::VecDeque, path::PathBuf};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

use super::read_image_file::{ImageFileInputError, load_frame};

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum FolderInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("读取目录 {path} 失败: {source}")]
  ReadDir {
    path: String,
    source: std::io::Error,
  },
  #[error("{0}")]
  Frame(#[from] ImageFileInputError),
}

/// `folder:///path/to/dir`，按文件名顺序逐张读取图像。
/// 单张图像读取失败只影响该帧。
pub struct FolderInput {
  files: VecDeque<PathBuf>,
  index: u64,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for FolderInput {
  type Error = FolderInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(FolderInputError::SchemeMismatch);
    }

    let dir = PathBuf::from(url.path());
    let read_dir_error = |source| FolderInputError::ReadDir {
      path: dir.display().to_string(),
      source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(read_dir_error)? {
      let path = entry.map_err(read_dir_error)?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
      if path.is_file() && is_image {
        files.push(path);
      }
    }
    files.sort();

    info!("目录 {} 中共有 {} 张图像", dir.display(), files.len());
    Ok(FolderInput {
      files: files.into(),
      index: 0,
    })
  }
}

impl FolderInput {
  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for FolderInput {
  type Item = Result<Frame, FolderInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.pop_front()?;
    let index = self.index;
    self.index += 1;
    Some(load_frame(index, &path).map_err(FolderInputError::from))
  }
}

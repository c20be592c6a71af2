// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/frame.rs - 帧定义与张量布局转换
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

use image::{GrayImage, Luma, RgbImage};
use ndarray::{Array3, Array4, Axis};

const RGB_CHANNELS: usize = 3;

/// 一次检测所用的输入帧，检测过程中只读
#[derive(Debug, Clone)]
pub struct Frame {
  pub index: u64,
  pub source: String,
  pub image: RgbImage,
}

impl Frame {
  pub fn new(index: u64, source: impl Into<String>, image: RgbImage) -> Self {
    Self {
      index,
      source: source.into(),
      image,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }
}

/// 张量的通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

/// 将 RGB 图像转为 CHW 浮点张量，`map` 接收（输出通道，像素值）
pub fn rgb_to_chw<F>(image: &RgbImage, order: ChannelOrder, map: F) -> Array3<f32>
where
  F: Fn(usize, u8) -> f32,
{
  let (width, height) = image.dimensions();
  Array3::from_shape_fn(
    (RGB_CHANNELS, height as usize, width as usize),
    |(c, h, w)| {
      let source = match order {
        ChannelOrder::Rgb => c,
        ChannelOrder::Bgr => RGB_CHANNELS - 1 - c,
      };
      let pixel = image.get_pixel(w as u32, h as u32);
      map(c, pixel[source])
    },
  )
}

/// 将 RGB 图像转为 NCHW 浮点张量（批大小为 1）
pub fn rgb_to_nchw<F>(image: &RgbImage, order: ChannelOrder, map: F) -> Array4<f32>
where
  F: Fn(usize, u8) -> f32,
{
  rgb_to_chw(image, order, map).insert_axis(Axis(0))
}

/// BT.601 灰度化，定点系数与 OpenCV 的 RGB/BGR 转灰度一致：
/// `Y = (4899 R + 9617 G + 1868 B + 8192) >> 14`
pub fn rgb_to_gray_bt601(image: &RgbImage) -> GrayImage {
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    let [r, g, b] = image.get_pixel(x, y).0;
    let luma = (4899 * r as u32 + 9617 * g as u32 + 1868 * b as u32 + 8192) >> 14;
    Luma([luma as u8])
  })
}

/// 将灰度图像转为 (1, 1, H, W) 的原始像素张量
pub fn gray_to_nchw(image: &GrayImage) -> Array4<f32> {
  let (width, height) = image.dimensions();
  Array4::from_shape_fn((1, 1, height as usize, width as usize), |(_, _, h, w)| {
    image.get_pixel(w as u32, h as u32)[0] as f32
  })
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/letterbox.rs - 等比缩放填充与坐标反变换
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

//! 等比缩放 + 居中填充（letterbox），以及从画布坐标回到原图坐标的反变换。
//!
//! 所有取整都使用 `f64::round`（远离零方向舍入），正变换和反变换保持一致。

use image::{ImageBuffer, Pixel, imageops};

/// 3 通道检测模型的默认填充值
pub const DEFAULT_PAD_VALUE: u8 = 114;

/// 一次 letterbox 变换记录下的参数，供反变换使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxParams {
  pub image_w: u32,
  pub image_h: u32,
  pub target_w: u32,
  pub target_h: u32,
  pub scaled_w: u32,
  pub scaled_h: u32,
  /// 原图到画布的缩放比例
  pub scale: f64,
  pub pad_top: u32,
  pub pad_left: u32,
  pub based_on_width: bool,
}

impl LetterboxParams {
  /// 计算缩放尺寸与对称填充，调用方需保证所有尺寸大于 0
  pub fn compute(image_w: u32, image_h: u32, target_w: u32, target_h: u32) -> Self {
    let (iw, ih) = (image_w as f64, image_h as f64);
    let (tw, th) = (target_w as f64, target_h as f64);

    let based_on_width = th >= ih * tw / iw;
    let (scaled_w, scaled_h, scale) = if based_on_width {
      let scaled_h = (ih * tw / iw).round() as u32;
      (target_w, scaled_h.clamp(1, target_h), tw / iw)
    } else {
      let scaled_w = (iw * th / ih).round() as u32;
      (scaled_w.clamp(1, target_w), target_h, th / ih)
    };

    let pad_top = ((target_h - scaled_h) as f64 / 2.0).round().max(0.0) as u32;
    let pad_left = ((target_w - scaled_w) as f64 / 2.0).round().max(0.0) as u32;

    Self {
      image_w,
      image_h,
      target_w,
      target_h,
      scaled_w,
      scaled_h,
      scale,
      pad_top,
      pad_left,
      based_on_width,
    }
  }

  pub fn pad_bottom(&self) -> u32 {
    self.target_h - self.pad_top - self.scaled_h
  }

  pub fn pad_right(&self) -> u32 {
    self.target_w - self.pad_left - self.scaled_w
  }

  /// 原图坐标 -> 画布坐标
  pub fn forward_point(&self, x: f64, y: f64) -> (f64, f64) {
    (
      x * self.scale + self.pad_left as f64,
      y * self.scale + self.pad_top as f64,
    )
  }

  /// 画布坐标 -> 原图坐标（未取整）
  pub fn invert_point(&self, x: f64, y: f64) -> (f64, f64) {
    (
      (x - self.pad_left as f64) / self.scale,
      (y - self.pad_top as f64) / self.scale,
    )
  }

  /// 将画布上左上角为 (x, y)、尺寸为 w×h 的框映射回原图，并裁剪到图像范围
  pub fn invert_box(&self, x: f64, y: f64, w: f64, h: f64) -> [i32; 4] {
    let (x1, y1) = self.invert_point(x, y);
    let (x2, y2) = self.invert_point(x + w, y + h);
    round_clamp_box([x1, y1, x2, y2], self.image_w, self.image_h)
  }
}

/// 四舍五入（远离零）并将 [x1, y1, x2, y2] 裁剪到 [0, width] × [0, height]
pub fn round_clamp_box(bbox: [f64; 4], width: u32, height: u32) -> [i32; 4] {
  let clamp = |v: f64, max: u32| (v.round().clamp(0.0, max as f64)) as i32;
  [
    clamp(bbox[0], width),
    clamp(bbox[1], height),
    clamp(bbox[2], width),
    clamp(bbox[3], height),
  ]
}

/// 双线性缩放并居中填充到 target_w × target_h 的画布
pub fn letterbox<P>(
  image: &ImageBuffer<P, Vec<P::Subpixel>>,
  target_w: u32,
  target_h: u32,
  pad: P,
) -> (ImageBuffer<P, Vec<P::Subpixel>>, LetterboxParams)
where
  P: Pixel + 'static,
  P::Subpixel: 'static,
{
  let params = LetterboxParams::compute(image.width(), image.height(), target_w, target_h);

  let resized = imageops::resize(
    image,
    params.scaled_w,
    params.scaled_h,
    imageops::FilterType::Triangle,
  );

  let mut canvas = ImageBuffer::from_pixel(target_w, target_h, pad);
  imageops::replace(
    &mut canvas,
    &resized,
    params.pad_left as i64,
    params.pad_top as i64,
  );

  (canvas, params)
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/region.rs - 分类模型的感兴趣区域
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

use std::str::FromStr;

use crate::frame::Frame;

/// 原图上的矩形区域，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
  pub x: u32,
  pub y: u32,
  pub w: u32,
  pub h: u32,
}

impl Region {
  pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
    Self { x, y, w, h }
  }

  /// 裁剪到图像范围内，面积为 0 时返回 None
  pub fn clamp_to(&self, width: u32, height: u32) -> Option<Region> {
    let x = self.x.min(width);
    let y = self.y.min(height);
    let w = self.w.min(width - x);
    let h = self.h.min(height - y);
    (w > 0 && h > 0).then_some(Region { x, y, w, h })
  }

  pub fn bbox(&self) -> [i32; 4] {
    [
      self.x as i32,
      self.y as i32,
      (self.x + self.w) as i32,
      (self.y + self.h) as i32,
    ]
  }
}

impl FromStr for Region {
  type Err = String;

  /// 格式为 `x,y,w,h`
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts = s
      .split(',')
      .map(|p| p.trim().parse::<u32>())
      .collect::<Result<Vec<_>, _>>()
      .map_err(|e| format!("区域 '{}' 解析失败: {}", s, e))?;
    match parts.as_slice() {
      [x, y, w, h] => Ok(Region::new(*x, *y, *w, *h)),
      _ => Err(format!("区域 '{}' 需要 4 个数值: x,y,w,h", s)),
    }
  }
}

/// 外部区域定位器（例如人脸检测）的接口
pub trait RegionSource {
  fn regions(&self, frame: &Frame) -> Vec<Region>;
}

/// 整帧作为唯一区域
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeFrame;

impl RegionSource for WholeFrame {
  fn regions(&self, frame: &Frame) -> Vec<Region> {
    vec![Region::new(0, 0, frame.width(), frame.height())]
  }
}

/// 调用方给定的固定区域
#[derive(Debug, Clone, Default)]
pub struct FixedRegions(pub Vec<Region>);

impl RegionSource for FixedRegions {
  fn regions(&self, _frame: &Frame) -> Vec<Region> {
    self.0.clone()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  #[test]
  fn parse_region() {
    assert_eq!("10, 20,30,40".parse::<Region>(), Ok(Region::new(10, 20, 30, 40)));
    assert!("10,20,30".parse::<Region>().is_err());
    assert!("a,b,c,d".parse::<Region>().is_err());
  }

  #[test]
  fn clamp_region_to_image() {
    let region = Region::new(50, 50, 100, 100);
    assert_eq!(region.clamp_to(120, 80), Some(Region::new(50, 50, 70, 30)));
    assert_eq!(Region::new(200, 0, 10, 10).clamp_to(120, 80), None);
  }

  #[test]
  fn whole_frame_covers_image() {
    let frame = Frame::new(0, "test", RgbImage::new(32, 24));
    assert_eq!(WholeFrame.regions(&frame), vec![Region::new(0, 0, 32, 24)]);
    assert_eq!(Region::new(0, 0, 32, 24).bbox(), [0, 0, 32, 24]);
  }
}

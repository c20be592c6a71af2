// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use std::{path::Path, time::Duration};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage, imageops};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;

use crate::model::{DetectItem, DetectResult};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 无字体时估算标签宽度
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const BOX_THICKNESS: i32 = 2;
const OVERLAY_FONT_SIZE: f32 = 32.0;
const OVERLAY_POSITION: (i32, i32) = (40, 80);
const OVERLAY_COLOR: [u8; 3] = [255, 0, 0];
const OUTPUT_SCALE: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("读取字体文件 {path} 失败: {source}")]
  FontIo {
    path: String,
    source: std::io::Error,
  },
  #[error("字体文件 {0} 无效")]
  FontInvalid(String),
}

pub struct Draw {
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  output_scale: f32,
  font: Option<FontArc>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      output_scale: OUTPUT_SCALE,
      font: None,
    }
  }
}

/// 与给定颜色互补的颜色，用作标签文字颜色
pub fn complementary(color: [u8; 3]) -> [u8; 3] {
  [255 - color[0], 255 - color[1], 255 - color[2]]
}

/// 叠加在输出图像上的耗时文字
pub fn overlay_text(duration: Duration) -> Option<String> {
  let secs = duration.as_secs_f64();
  (secs > 0.0).then(|| format!("Detect 1 frame : {:8.6} sec | {:6.2} fps", secs, 1.0 / secs))
}

impl Draw {
  /// 加载 TTF 字体；未加载字体时只画框和标签底色
  pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| DrawError::FontIo {
      path: path.display().to_string(),
      source,
    })?;
    let font =
      FontArc::try_from_vec(data).map_err(|_| DrawError::FontInvalid(path.display().to_string()))?;
    self.font = Some(font);
    Ok(self)
  }

  pub fn with_output_scale(mut self, scale: f32) -> Self {
    self.output_scale = scale;
    self
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在原图副本上绘制全部结果，再按输出比例缩小
  pub fn draw_detections(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut canvas = image.clone();
    for item in result.iter() {
      self.draw_bbox_with_label(&mut canvas, item);
    }

    if let Some(font) = &self.font
      && let Some(text) = overlay_text(result.inference_time)
    {
      let (x, y) = OVERLAY_POSITION;
      draw_text_mut(
        &mut canvas,
        Rgb(OVERLAY_COLOR),
        x,
        y,
        PxScale::from(OVERLAY_FONT_SIZE),
        font,
        &text,
      );
    }

    self.downscale(canvas)
  }

  fn downscale(&self, image: RgbImage) -> RgbImage {
    if (self.output_scale - 1.0).abs() < f32::EPSILON {
      return image;
    }
    let width = ((image.width() as f32 * self.output_scale).round() as u32).max(1);
    let height = ((image.height() as f32 * self.output_scale).round() as u32).max(1);
    imageops::resize(&image, width, height, imageops::FilterType::Triangle)
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, item: &DetectItem) {
    let [x_min, y_min, x_max, y_max] = item.bbox;
    if x_min >= x_max || y_min >= y_max {
      return;
    }
    let color = Rgb(item.color);

    // 边框向内加粗
    for t in 0..BOX_THICKNESS {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = format!("{} {:.2}", item.label, item.score);
    let scale = PxScale::from(self.font_size);
    let text_width = match &self.font {
      Some(font) => text_size(scale, font, &label).0 as i32,
      None => (label.chars().count() as f32 * self.label_char_width) as i32,
    };
    let text_height = self.label_text_height;

    // 标签位于边框上方，空间不足时贴顶
    let label_x = x_min.max(0);
    let label_y = (y_min - text_height).max(0);
    let label_width = text_width.min(image.width() as i32 - label_x);
    if label_width <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, text_height as u32);
    draw_filled_rect_mut(image, rect, color);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(complementary(item.color)),
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        font,
        &label,
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(items: Vec<DetectItem>, inference_time: Duration) -> DetectResult {
    DetectResult {
      items: items.into_boxed_slice(),
      image_size: (200, 100),
      inference_time,
    }
  }

  fn item(bbox: [i32; 4]) -> DetectItem {
    DetectItem {
      class_id: 0,
      label: "cat".to_string(),
      color: [0, 200, 0],
      score: 0.75,
      bbox,
    }
  }

  #[test]
  fn output_is_half_size() {
    let image = RgbImage::new(200, 100);
    let drawn = Draw::default().draw_detections(&image, &result(Vec::new(), Duration::ZERO));
    assert_eq!(drawn.dimensions(), (100, 50));
  }

  #[test]
  fn box_edges_use_class_color() {
    let image = RgbImage::new(200, 100);
    let draw = Draw::default().with_output_scale(1.0);
    let drawn = draw.draw_detections(&image, &result(vec![item([50, 40, 150, 90])], Duration::ZERO));
    assert_eq!(drawn.get_pixel(100, 89), &Rgb([0, 200, 0]));
    assert_eq!(drawn.get_pixel(100, 88), &Rgb([0, 200, 0]));
    assert_eq!(drawn.get_pixel(100, 87), &Rgb([0, 0, 0]));
    // 标签底色位于框上方
    assert_eq!(drawn.get_pixel(55, 20), &Rgb([0, 200, 0]));
  }

  #[test]
  fn degenerate_boxes_are_skipped() {
    let image = RgbImage::new(20, 20);
    let draw = Draw::default().with_output_scale(1.0);
    let drawn = draw.draw_detections(&image, &result(vec![item([10, 10, 10, 15])], Duration::ZERO));
    assert!(drawn.pixels().all(|p| p == &Rgb([0, 0, 0])));
  }

  #[test]
  fn overlay_text_formats_duration() {
    assert_eq!(overlay_text(Duration::ZERO), None);
    assert_eq!(
      overlay_text(Duration::from_millis(250)).as_deref(),
      Some("Detect 1 frame : 0.250000 sec |   4.00 fps")
    );
  }

  #[test]
  fn complementary_inverts_channels() {
    assert_eq!(complementary([255, 0, 10]), [0, 255, 245]);
  }

  #[test]
  fn missing_font_is_an_error() {
    assert!(matches!(
      Draw::default().with_font_file("/no/such/font.ttf"),
      Err(DrawError::FontIo { .. })
    ));
  }
}

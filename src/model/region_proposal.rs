// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/region_proposal.rs - 两阶段检测解码（Faster R-CNN）
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

use ndarray::Ix2;
use tracing::debug;

use crate::{config::ModelConfig, inference::Tensor, letterbox::round_clamp_box};

use super::{Decode, DecodeContext, DecodeError, DetectItem, make_item, output_at};

/// 输出依次为 boxes[N, 4] (x1, y1, x2, y2)、labels[N]、scores[N]，坐标位于画布上。
///
/// 该模型直接使用整块画布，坐标按 `原图尺寸 / 画布尺寸` 线性缩放回原图，
/// 不扣除填充偏移。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionProposalDecoder;

impl Decode for RegionProposalDecoder {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    let boxes = output_at(outputs, 0, 3)?
      .as_f32()
      .ok_or(DecodeError::Dtype("boxes"))?;
    let labels = output_at(outputs, 1, 3)?.to_i64();
    let scores = output_at(outputs, 2, 3)?.to_f32();

    let boxes = boxes
      .view()
      .into_dimensionality::<Ix2>()
      .map_err(|_| DecodeError::shape("boxes", "[N, 4]", boxes.shape()))?;
    let count = boxes.shape()[0];
    if boxes.shape()[1] != 4 {
      return Err(DecodeError::shape("boxes", "[N, 4]", boxes.shape()));
    }
    if labels.len() != count {
      return Err(DecodeError::shape("labels", format!("[{}]", count), labels.shape()));
    }
    if scores.len() != count {
      return Err(DecodeError::shape("scores", format!("[{}]", count), scores.shape()));
    }

    let (width, height) = ctx.image_size;
    let sx = width as f64 / config.canvas_w as f64;
    let sy = height as f64 / config.canvas_h as f64;

    let mut items = Vec::new();
    for ((bbox, &label), &score) in boxes.rows().into_iter().zip(labels.iter()).zip(scores.iter()) {
      if score < config.threshold {
        continue;
      }
      let class_id = usize::try_from(label)
        .map_err(|_| DecodeError::Index(format!("负类别 {}", label)))?;
      let scaled = [
        bbox[0] as f64 * sx,
        bbox[1] as f64 * sy,
        bbox[2] as f64 * sx,
        bbox[3] as f64 * sy,
      ];
      let bbox = round_clamp_box(scaled, width, height);
      items.push(make_item(config, class_id, score, bbox)?);
    }

    debug!("区域候选 {} 项，保留 {} 项", count, items.len());
    Ok(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::ModelKind, letterbox::LetterboxParams};
  use ndarray::{Array1, arr1, arr2};

  fn context(image_w: u32, image_h: u32) -> DecodeContext {
    DecodeContext {
      image_size: (image_w, image_h),
      letterbox: LetterboxParams::compute(image_w, image_h, 960, 640),
      region: None,
    }
  }

  fn outputs() -> Vec<Tensor> {
    vec![
      Tensor::from(arr2(&[
        [96.0f32, 64.0, 192.0, 128.0],
        [0.0, 0.0, 960.0, 640.0],
        [480.0, 320.0, 2000.0, 900.0],
      ])),
      Tensor::from(arr1(&[1i64, 3, 18])),
      Tensor::from(arr1(&[0.8f32, 0.2, 0.6])),
    ]
  }

  #[test]
  fn boxes_are_rescaled_linearly() {
    let config = ModelConfig::preset(ModelKind::FasterRcnn);
    let items = RegionProposalDecoder
      .decode(&config, &outputs(), &context(480, 320))
      .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].label, "person");
    assert_eq!(items[0].bbox, [48, 32, 96, 64]);
    assert_eq!(items[1].class_id, 18);
    // 超出画布的部分被裁剪到原图边界
    assert_eq!(items[1].bbox, [240, 160, 480, 320]);
  }

  #[test]
  fn raising_threshold_never_adds_detections() {
    let mut config = ModelConfig::preset(ModelKind::FasterRcnn);
    let mut last = usize::MAX;
    for step in 0..=10 {
      config.threshold = step as f32 / 10.0;
      let count = RegionProposalDecoder
        .decode(&config, &outputs(), &context(1920, 1080))
        .unwrap()
        .len();
      assert!(count <= last);
      last = count;
    }
  }

  #[test]
  fn float_labels_are_accepted() {
    let config = ModelConfig::preset(ModelKind::FasterRcnn);
    let mut tensors = outputs();
    tensors[1] = Tensor::from(arr1(&[1.0f32, 3.0, 18.0]));
    let items = RegionProposalDecoder
      .decode(&config, &tensors, &context(480, 320))
      .unwrap();
    assert_eq!(items.len(), 2);
  }

  #[test]
  fn mismatched_lengths_are_a_shape_error() {
    let config = ModelConfig::preset(ModelKind::FasterRcnn);
    let mut tensors = outputs();
    tensors[2] = Tensor::from(Array1::<f32>::zeros(2));
    assert!(matches!(
      RegionProposalDecoder.decode(&config, &tensors, &context(480, 320)),
      Err(DecodeError::Shape { .. })
    ));
  }

  #[test]
  fn label_outside_table_is_an_index_error() {
    let config = ModelConfig::preset(ModelKind::FasterRcnn);
    let mut tensors = outputs();
    tensors[1] = Tensor::from(arr1(&[81i64, 3, 18]));
    assert!(matches!(
      RegionProposalDecoder.decode(&config, &tensors, &context(480, 320)),
      Err(DecodeError::Index(_))
    ));
  }
}

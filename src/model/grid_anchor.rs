// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/grid_anchor.rs - 网格锚框解码（Tiny YOLOv2）
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

use ndarray::{ArrayView4, Ix4};
use tracing::debug;

use crate::{config::ModelConfig, inference::Tensor};

use super::{
  Decode, DecodeContext, DecodeError, DetectItem, argmax, make_item, output_at, sigmoid, softmax,
};

/// 画布坐标下通过阈值的候选框，(x, y) 为左上角
#[derive(Debug, Clone, PartialEq)]
pub struct GridCandidate {
  pub class_id: usize,
  pub objectness: f32,
  pub class_prob: f32,
  pub x: f64,
  pub y: f64,
  pub w: f64,
  pub h: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridAnchorDecoder;

impl GridAnchorDecoder {
  /// 遍历 (cy, cx, anchor) 输出画布坐标候选框，顺序固定，不做 NMS
  pub fn candidates(
    &self,
    config: &ModelConfig,
    output: ArrayView4<'_, f32>,
  ) -> Result<Vec<GridCandidate>, DecodeError> {
    let num_classes = config.num_classes();
    let num_anchors = config.num_anchors();
    let (grid_h, grid_w) = (config.grid_h, config.grid_w);
    let channels = num_anchors * (num_classes + 5);

    let shape = output.shape();
    if shape[0] < 1 || shape[1] != channels || shape[2] != grid_h || shape[3] != grid_w {
      return Err(DecodeError::shape(
        "grid",
        format!("[B, {}, {}, {}]", channels, grid_h, grid_w),
        shape,
      ));
    }

    let stride_x = config.canvas_w as f64 / grid_w as f64;
    let stride_y = config.canvas_h as f64 / grid_h as f64;

    let mut items = Vec::new();
    let mut classes = vec![0f32; num_classes];

    for cy in 0..grid_h {
      for cx in 0..grid_w {
        for b in 0..num_anchors {
          let channel = b * (num_classes + 5);
          let tx = output[[0, channel, cy, cx]];
          let ty = output[[0, channel + 1, cy, cx]];
          let tw = output[[0, channel + 2, cy, cx]];
          let th = output[[0, channel + 3, cy, cx]];
          let tc = output[[0, channel + 4, cy, cx]];

          let objectness = sigmoid(tc);

          for (c, slot) in classes.iter_mut().enumerate() {
            *slot = output[[0, channel + 5 + c, cy, cx]];
          }
          let probs = softmax(&classes, config.softmax);
          let Some((class_id, class_prob)) = argmax(&probs) else {
            continue;
          };

          if class_prob * objectness < config.threshold {
            continue;
          }

          let w = (tw as f64).exp() * stride_x * config.anchors[2 * b] as f64;
          let h = (th as f64).exp() * stride_y * config.anchors[2 * b + 1] as f64;
          let x = (cx as f64 + sigmoid(tx) as f64) * stride_x - w / 2.0;
          let y = (cy as f64 + sigmoid(ty) as f64) * stride_y - h / 2.0;

          items.push(GridCandidate {
            class_id,
            objectness,
            class_prob,
            x,
            y,
            w,
            h,
          });
        }
      }
    }

    Ok(items)
  }
}

impl Decode for GridAnchorDecoder {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    let output = output_at(outputs, 0, 1)?
      .as_f32()
      .ok_or(DecodeError::Dtype("grid"))?;
    let shape = output.shape().to_vec();
    let output = output
      .view()
      .into_dimensionality::<Ix4>()
      .map_err(|_| DecodeError::shape("grid", "4 维张量", &shape))?;

    let candidates = self.candidates(config, output)?;
    debug!("网格解码得到 {} 个候选框", candidates.len());

    candidates
      .into_iter()
      .map(|c| {
        let bbox = ctx.letterbox.invert_box(c.x, c.y, c.w, c.h);
        make_item(config, c.class_id, c.objectness, bbox)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::ModelKind, letterbox::LetterboxParams};
  use ndarray::Array4;

  const PERSON: usize = 14;

  fn empty_output(config: &ModelConfig) -> Array4<f32> {
    let channels = config.num_anchors() * (config.num_classes() + 5);
    Array4::zeros((1, channels, config.grid_h, config.grid_w))
  }

  fn context(image_w: u32, image_h: u32, config: &ModelConfig) -> DecodeContext {
    DecodeContext {
      image_size: (image_w, image_h),
      letterbox: LetterboxParams::compute(image_w, image_h, config.canvas_w, config.canvas_h),
      region: None,
    }
  }

  // 伪随机但确定的张量
  fn noisy_output(config: &ModelConfig) -> Array4<f32> {
    let mut output = empty_output(config);
    let mut state: u32 = 12345;
    for v in output.iter_mut() {
      state = state.wrapping_mul(1103515245).wrapping_add(12345);
      *v = ((state >> 8) % 2000) as f32 / 200.0 - 5.0;
    }
    output
  }

  #[test]
  fn peaked_person_cell_is_detected() {
    let config = ModelConfig::preset(ModelKind::TinyYolov2);
    let mut output = empty_output(&config);
    output[[0, 4, 6, 6]] = 10.0;
    output[[0, 5 + PERSON, 6, 6]] = 10.0;

    let ctx = context(640, 480, &config);
    let items = GridAnchorDecoder
      .decode(&config, &[Tensor::from(output)], &ctx)
      .unwrap();

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.label, "person");
    assert_eq!(item.class_id, PERSON);
    assert!(item.score > 0.999);
    // 中心 (208, 208)，锚框 0 为 34.56 x 38.08，画布比例 0.65，上边填充 52
    let expected = [293, 211, 347, 269];
    for i in 0..4 {
      assert!((item.bbox[i] - expected[i]).abs() <= 1, "{:?}", item.bbox);
    }
  }

  #[test]
  fn background_cells_are_rejected() {
    let config = ModelConfig::preset(ModelKind::TinyYolov2);
    let ctx = context(640, 480, &config);
    let items = GridAnchorDecoder
      .decode(&config, &[Tensor::from(empty_output(&config))], &ctx)
      .unwrap();
    assert!(items.is_empty());
  }

  #[test]
  fn duplicates_across_anchors_are_kept() {
    let config = ModelConfig::preset(ModelKind::TinyYolov2);
    let stride = config.num_classes() + 5;
    let mut output = empty_output(&config);
    for b in 0..config.num_anchors() {
      output[[0, b * stride + 4, 3, 3]] = 10.0;
      output[[0, b * stride + 5 + PERSON, 3, 3]] = 10.0;
    }
    let candidates = GridAnchorDecoder.candidates(&config, output.view()).unwrap();
    assert_eq!(candidates.len(), config.num_anchors());
    assert!(candidates.iter().all(|c| c.class_id == PERSON));
  }

  #[test]
  fn decode_is_deterministic() {
    let mut config = ModelConfig::preset(ModelKind::TinyYolov2);
    config.threshold = 0.1;
    let output = Tensor::from(noisy_output(&config));
    let ctx = context(1280, 720, &config);
    let first = GridAnchorDecoder.decode(&config, &[output.clone()], &ctx).unwrap();
    let second = GridAnchorDecoder.decode(&config, &[output], &ctx).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
  }

  #[test]
  fn raising_threshold_never_adds_detections() {
    let mut config = ModelConfig::preset(ModelKind::TinyYolov2);
    let output = Tensor::from(noisy_output(&config));
    let ctx = context(640, 480, &config);
    let mut last = usize::MAX;
    for step in 0..=10 {
      config.threshold = step as f32 / 10.0;
      let count = GridAnchorDecoder
        .decode(&config, &[output.clone()], &ctx)
        .unwrap()
        .len();
      assert!(count <= last);
      last = count;
    }
  }

  #[test]
  fn boxes_stay_inside_image() {
    let mut config = ModelConfig::preset(ModelKind::TinyYolov2);
    config.threshold = 0.0;
    let output = Tensor::from(noisy_output(&config));
    let ctx = context(300, 500, &config);
    let items = GridAnchorDecoder.decode(&config, &[output], &ctx).unwrap();
    assert_eq!(items.len(), 13 * 13 * 5);
    for item in items {
      let [x1, y1, x2, y2] = item.bbox;
      assert!((0..=300).contains(&x1) && (0..=300).contains(&x2));
      assert!((0..=500).contains(&y1) && (0..=500).contains(&y2));
    }
  }

  #[test]
  fn reference_softmax_matches_stable_on_small_logits() {
    let mut config = ModelConfig::preset(ModelKind::TinyYolov2);
    config.threshold = 0.05;
    let output = noisy_output(&config);
    let stable = GridAnchorDecoder.candidates(&config, output.view()).unwrap();
    config.softmax = crate::config::SoftmaxMode::Reference;
    let reference = GridAnchorDecoder.candidates(&config, output.view()).unwrap();
    assert_eq!(stable.len(), reference.len());
    for (a, b) in stable.iter().zip(&reference) {
      assert_eq!(a.class_id, b.class_id);
      assert!((a.class_prob - b.class_prob).abs() < 1e-5);
    }
  }

  #[test]
  fn wrong_channel_count_is_a_shape_error() {
    let config = ModelConfig::preset(ModelKind::TinyYolov2);
    let output = Tensor::from(Array4::<f32>::zeros((1, 100, 13, 13)));
    let ctx = context(640, 480, &config);
    assert!(matches!(
      GridAnchorDecoder.decode(&config, &[output], &ctx),
      Err(DecodeError::Shape { .. })
    ));
  }

  #[test]
  fn missing_output_is_reported() {
    let config = ModelConfig::preset(ModelKind::TinyYolov2);
    let ctx = context(640, 480, &config);
    assert!(matches!(
      GridAnchorDecoder.decode(&config, &[], &ctx),
      Err(DecodeError::MissingOutput { expected: 1, actual: 0 })
    ));
  }
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/proposal_list.rs - 候选索引列表解码（YOLOv3，图内已做 NMS）
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

use ndarray::Ix3;
use tracing::debug;

use crate::{config::ModelConfig, inference::Tensor, letterbox::round_clamp_box};

use super::{Decode, DecodeContext, DecodeError, DetectItem, make_item, output_at};

/// 输出依次为 boxes[B, N, 4] (y1, x1, y2, x2)、scores[B, C, N]、indices[K, 3]。
/// 坐标已是绝对像素，只做查表、阈值过滤和裁剪。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalListDecoder;

impl Decode for ProposalListDecoder {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    let boxes = output_at(outputs, 0, 3)?
      .as_f32()
      .ok_or(DecodeError::Dtype("boxes"))?;
    let scores = output_at(outputs, 1, 3)?
      .as_f32()
      .ok_or(DecodeError::Dtype("scores"))?;
    let indices = output_at(outputs, 2, 3)?.to_i64();

    let boxes = boxes
      .view()
      .into_dimensionality::<Ix3>()
      .map_err(|_| DecodeError::shape("boxes", "[B, N, 4]", boxes.shape()))?;
    if boxes.shape()[2] != 4 {
      return Err(DecodeError::shape("boxes", "[B, N, 4]", boxes.shape()));
    }
    let scores = scores
      .view()
      .into_dimensionality::<Ix3>()
      .map_err(|_| DecodeError::shape("scores", "[B, C, N]", scores.shape()))?;

    // 部分导出的模型会带一个前导批维度：[1, K, 3]
    let index_shape = indices.shape().to_vec();
    if index_shape.last() != Some(&3) && !indices.is_empty() {
      return Err(DecodeError::shape("indices", "[K, 3]", &index_shape));
    }
    let rows = indices.len() / 3;
    let indices = indices
      .into_shape_with_order((rows, 3))
      .map_err(|_| DecodeError::shape("indices", "[K, 3]", &index_shape))?;

    let (width, height) = ctx.image_size;
    let mut items = Vec::new();

    for row in indices.rows() {
      let (batch, class, index) = (to_index(row[0])?, to_index(row[1])?, to_index(row[2])?);
      let score = *scores.get([batch, class, index]).ok_or_else(|| {
        DecodeError::Index(format!(
          "scores[{}][{}][{}] 超出 {:?}",
          batch,
          class,
          index,
          scores.shape()
        ))
      })?;

      if score < config.threshold {
        continue;
      }

      if batch >= boxes.shape()[0] || index >= boxes.shape()[1] {
        return Err(DecodeError::Index(format!(
          "boxes[{}][{}] 超出 {:?}",
          batch,
          index,
          boxes.shape()
        )));
      }
      let y1 = boxes[[batch, index, 0]] as f64;
      let x1 = boxes[[batch, index, 1]] as f64;
      let y2 = boxes[[batch, index, 2]] as f64;
      let x2 = boxes[[batch, index, 3]] as f64;

      let bbox = round_clamp_box([x1, y1, x2, y2], width, height);
      items.push(make_item(config, class, score, bbox)?);
    }

    debug!("候选列表 {} 项，保留 {} 项", rows, items.len());
    Ok(items)
  }
}

fn to_index(value: i64) -> Result<usize, DecodeError> {
  usize::try_from(value).map_err(|_| DecodeError::Index(format!("负索引 {}", value)))
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model/classification.rs - 区域分类解码（FER+ 表情）
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

use tracing::debug;

use crate::{config::ModelConfig, inference::Tensor, letterbox::round_clamp_box};

use super::{Decode, DecodeContext, DecodeError, DetectItem, argmax, make_item, output_at, softmax};

/// softmax 之前对原始分数的下限，负分数被抬到该值
pub const SCORE_EPSILON: f32 = 1e-9;

/// 每个区域一个长度为类别数的分数向量；检测框就是区域本身
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationDecoder;

impl ClassificationDecoder {
  /// 下限截断后做 softmax，返回类别概率
  pub fn probabilities(&self, config: &ModelConfig, scores: &[f32]) -> Vec<f32> {
    let clamped: Vec<f32> = scores.iter().map(|&s| s.max(SCORE_EPSILON)).collect();
    softmax(&clamped, config.softmax)
  }
}

impl Decode for ClassificationDecoder {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    let scores = output_at(outputs, 0, 1)?
      .as_f32()
      .ok_or(DecodeError::Dtype("scores"))?;
    if scores.len() != config.num_classes() {
      return Err(DecodeError::shape(
        "scores",
        format!("[1, {}]", config.num_classes()),
        scores.shape(),
      ));
    }
    let region = ctx
      .region
      .ok_or_else(|| DecodeError::Index("分类解码缺少区域".to_string()))?;

    let raw: Vec<f32> = scores.iter().copied().collect();
    let probs = self.probabilities(config, &raw);
    let Some((class_id, score)) = argmax(&probs) else {
      return Ok(Vec::new());
    };
    debug!("区域 {:?} 分类结果: {} ({:.4})", region, class_id, score);

    if score < config.threshold {
      return Ok(Vec::new());
    }

    let (width, height) = ctx.image_size;
    let [x1, y1, x2, y2] = region.bbox();
    let bbox = round_clamp_box([x1 as f64, y1 as f64, x2 as f64, y2 as f64], width, height);
    Ok(vec![make_item(config, class_id, score, bbox)?])
  }
}

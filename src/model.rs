// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/model.rs - 模型与解码器
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

use std::time::Duration;

use thiserror::Error;

use crate::{
  config::{ModelConfig, ModelKind, SoftmaxMode},
  inference::Tensor,
  letterbox::LetterboxParams,
};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 原图坐标系下的一个检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: usize,
  pub label: String,
  pub color: [u8; 3],
  pub score: f32,
  pub bbox: [i32; 4], // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
  pub image_size: (u32, u32),
  pub inference_time: Duration,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = &DetectItem> {
    self.items.iter()
  }
}

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("输出张量数量不足: 需要 {expected}, 实际 {actual}")]
  MissingOutput { expected: usize, actual: usize },
  #[error("输出 {name} 形状不符: 期望 {expected}, 实际 {actual:?}")]
  Shape {
    name: &'static str,
    expected: String,
    actual: Vec<usize>,
  },
  #[error("输出 {0} 需要浮点张量")]
  Dtype(&'static str),
  #[error("索引越界: {0}")]
  Index(String),
}

impl DecodeError {
  fn shape(name: &'static str, expected: impl Into<String>, actual: &[usize]) -> Self {
    DecodeError::Shape {
      name,
      expected: expected.into(),
      actual: actual.to_vec(),
    }
  }
}

/// 解码时需要的帧级信息
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
  /// 原图尺寸 (宽, 高)
  pub image_size: (u32, u32),
  pub letterbox: LetterboxParams,
  /// 分类模型所对应的原图区域
  pub region: Option<Region>,
}

/// 将原始输出张量解码为检测结果
pub trait Decode {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError>;
}

/// 按模型种类选择的解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
  GridAnchor(GridAnchorDecoder),
  ProposalList(ProposalListDecoder),
  RegionProposal(RegionProposalDecoder),
  Classification(ClassificationDecoder),
}

impl Decoder {
  pub fn for_kind(kind: ModelKind) -> Self {
    match kind {
      ModelKind::TinyYolov2 => Decoder::GridAnchor(GridAnchorDecoder),
      ModelKind::Yolov3 => Decoder::ProposalList(ProposalListDecoder),
      ModelKind::FasterRcnn => Decoder::RegionProposal(RegionProposalDecoder),
      ModelKind::EmotionFerplus => Decoder::Classification(ClassificationDecoder),
    }
  }
}

impl Decode for Decoder {
  fn decode(
    &self,
    config: &ModelConfig,
    outputs: &[Tensor],
    ctx: &DecodeContext,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    match self {
      Decoder::GridAnchor(decoder) => decoder.decode(config, outputs, ctx),
      Decoder::ProposalList(decoder) => decoder.decode(config, outputs, ctx),
      Decoder::RegionProposal(decoder) => decoder.decode(config, outputs, ctx),
      Decoder::Classification(decoder) => decoder.decode(config, outputs, ctx),
    }
  }
}

pub(crate) fn output_at<'a>(
  outputs: &'a [Tensor],
  index: usize,
  expected: usize,
) -> Result<&'a Tensor, DecodeError> {
  outputs.get(index).ok_or(DecodeError::MissingOutput {
    expected,
    actual: outputs.len(),
  })
}

/// 根据类别编号查表生成检测项
pub(crate) fn make_item(
  config: &ModelConfig,
  class_id: usize,
  score: f32,
  bbox: [i32; 4],
) -> Result<DetectItem, DecodeError> {
  let label = config.labels.get(class_id).ok_or_else(|| {
    DecodeError::Index(format!(
      "类别 {} 超出类别表长度 {}",
      class_id,
      config.labels.len()
    ))
  })?;
  let color = config.colors.get(class_id).copied().unwrap_or([255, 255, 255]);
  Ok(DetectItem {
    class_id,
    label: label.clone(),
    color,
    score,
    bbox,
  })
}

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// softmax，内部以 f64 计算
pub fn softmax(scores: &[f32], mode: SoftmaxMode) -> Vec<f32> {
  let shift = match mode {
    SoftmaxMode::Stable => scores
      .iter()
      .map(|&s| s as f64)
      .fold(f64::NEG_INFINITY, f64::max),
    SoftmaxMode::Reference => 0.0,
  };
  let exps: Vec<f64> = scores.iter().map(|&s| (s as f64 - shift).exp()).collect();
  let sum: f64 = exps.iter().sum();
  exps.iter().map(|&e| (e / sum) as f32).collect()
}

/// 最大值下标，相等时取第一个
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
  values
    .iter()
    .copied()
    .enumerate()
    .fold(None, |best, (i, v)| match best {
      Some((_, b)) if !(v > b) => best,
      _ => Some((i, v)),
    })
}

mod classification;
mod detector;
mod grid_anchor;
mod proposal_list;
mod region;
mod region_proposal;

pub use self::classification::{ClassificationDecoder, SCORE_EPSILON};
pub use self::detector::{DetectError, Detector, DetectorBuilder, ModelError};
pub use self::grid_anchor::{GridAnchorDecoder, GridCandidate};
pub use self::proposal_list::ProposalListDecoder;
pub use self::region::{FixedRegions, Region, RegionSource, WholeFrame};
pub use self::region_proposal::RegionProposalDecoder;

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/config.rs - 模型配置表
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod labels;

use self::labels::{
  BACKGROUND_COLOR, BACKGROUND_LABEL, COCO_LABELS, EMOTION_LABELS, EMOTION_PALETTE, VOC_LABELS,
  cycled_palette, to_owned_labels,
};

const TINY_YOLOV2_ANCHORS: [f32; 10] = [1.08, 1.19, 3.42, 4.41, 6.63, 11.38, 9.42, 5.11, 16.62, 10.52];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("配置文件读取错误: {0}")]
  Io(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("类别表为空")]
  EmptyLabels,
  #[error("配色数量与类别数量不一致: 类别 {labels}, 配色 {colors}")]
  ColorCount { labels: usize, colors: usize },
  #[error("置信度阈值必须在 [0, 1] 内: {0}")]
  Threshold(f32),
  #[error("锚框参数必须为非空的 (w, h) 对: 共 {0} 个数值")]
  Anchors(usize),
  #[error("画布尺寸无效: {0}x{1}")]
  Canvas(u32, u32),
  #[error("网格尺寸无效: {0}x{1}")]
  Grid(usize, usize),
  #[error("未知的模型类型: {0}")]
  UnknownKind(String),
}

/// 模型种类，决定预处理方式与解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
  TinyYolov2,
  Yolov3,
  FasterRcnn,
  EmotionFerplus,
}

impl ModelKind {
  pub const ALL: [ModelKind; 4] = [
    ModelKind::TinyYolov2,
    ModelKind::Yolov3,
    ModelKind::FasterRcnn,
    ModelKind::EmotionFerplus,
  ];

  /// 模型 URL 使用的方案名
  pub fn scheme(&self) -> &'static str {
    match self {
      ModelKind::TinyYolov2 => "tiny-yolov2",
      ModelKind::Yolov3 => "yolov3",
      ModelKind::FasterRcnn => "faster-rcnn",
      ModelKind::EmotionFerplus => "emotion-ferplus",
    }
  }

  pub fn from_scheme(scheme: &str) -> Result<Self, ConfigError> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.scheme() == scheme)
      .ok_or_else(|| ConfigError::UnknownKind(scheme.to_string()))
  }
}

/// softmax 的计算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoftmaxMode {
  /// 先减去最大值再求指数
  #[default]
  Stable,
  /// 直接求指数，与参考输出逐位对齐时使用
  Reference,
}

/// 单个模型的只读配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  pub kind: ModelKind,
  pub labels: Vec<String>,
  pub colors: Vec<[u8; 3]>,
  pub threshold: f32,
  /// (w, h) 对，单位为网格；仅网格锚框模型使用
  #[serde(default)]
  pub anchors: Vec<f32>,
  pub canvas_w: u32,
  pub canvas_h: u32,
  #[serde(default)]
  pub grid_w: usize,
  #[serde(default)]
  pub grid_h: usize,
  pub pad_value: u8,
  #[serde(default)]
  pub softmax: SoftmaxMode,
}

/// JSON 覆盖项，未给出的字段保留预设值
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfigOverride {
  pub labels: Option<Vec<String>>,
  pub colors: Option<Vec<[u8; 3]>>,
  pub threshold: Option<f32>,
  pub anchors: Option<Vec<f32>>,
  pub canvas_w: Option<u32>,
  pub canvas_h: Option<u32>,
  pub grid_w: Option<usize>,
  pub grid_h: Option<usize>,
  pub pad_value: Option<u8>,
  pub softmax: Option<SoftmaxMode>,
}

impl ModelConfig {
  pub fn preset(kind: ModelKind) -> Self {
    match kind {
      ModelKind::TinyYolov2 => Self {
        kind,
        labels: to_owned_labels(&VOC_LABELS),
        colors: cycled_palette(VOC_LABELS.len()),
        threshold: 0.4,
        anchors: TINY_YOLOV2_ANCHORS.to_vec(),
        canvas_w: 416,
        canvas_h: 416,
        grid_w: 13,
        grid_h: 13,
        pad_value: 114,
        softmax: SoftmaxMode::Stable,
      },
      ModelKind::Yolov3 => Self {
        kind,
        labels: to_owned_labels(&COCO_LABELS),
        colors: cycled_palette(COCO_LABELS.len()),
        threshold: 0.5,
        anchors: Vec::new(),
        canvas_w: 416,
        canvas_h: 416,
        grid_w: 0,
        grid_h: 0,
        pad_value: 114,
        softmax: SoftmaxMode::Stable,
      },
      ModelKind::FasterRcnn => {
        let mut labels = vec![BACKGROUND_LABEL.to_string()];
        labels.extend(to_owned_labels(&COCO_LABELS));
        let mut colors = vec![BACKGROUND_COLOR];
        colors.extend(cycled_palette(COCO_LABELS.len()));
        Self {
          kind,
          labels,
          colors,
          threshold: 0.5,
          anchors: Vec::new(),
          // 需要能被 32 整除
          canvas_w: 960,
          canvas_h: 640,
          grid_w: 0,
          grid_h: 0,
          pad_value: 114,
          softmax: SoftmaxMode::Stable,
        }
      }
      ModelKind::EmotionFerplus => Self {
        kind,
        labels: to_owned_labels(&EMOTION_LABELS),
        colors: EMOTION_PALETTE.to_vec(),
        threshold: 0.5,
        anchors: Vec::new(),
        canvas_w: 64,
        canvas_h: 64,
        grid_w: 0,
        grid_h: 0,
        pad_value: 0,
        softmax: SoftmaxMode::Stable,
      },
    }
  }

  pub fn num_classes(&self) -> usize {
    self.labels.len()
  }

  pub fn num_anchors(&self) -> usize {
    self.anchors.len() / 2
  }

  pub fn apply(mut self, patch: ModelConfigOverride) -> Self {
    if let Some(labels) = patch.labels {
      self.labels = labels;
    }
    if let Some(colors) = patch.colors {
      self.colors = colors;
    }
    if let Some(threshold) = patch.threshold {
      self.threshold = threshold;
    }
    if let Some(anchors) = patch.anchors {
      self.anchors = anchors;
    }
    if let Some(canvas_w) = patch.canvas_w {
      self.canvas_w = canvas_w;
    }
    if let Some(canvas_h) = patch.canvas_h {
      self.canvas_h = canvas_h;
    }
    if let Some(grid_w) = patch.grid_w {
      self.grid_w = grid_w;
    }
    if let Some(grid_h) = patch.grid_h {
      self.grid_h = grid_h;
    }
    if let Some(pad_value) = patch.pad_value {
      self.pad_value = pad_value;
    }
    if let Some(softmax) = patch.softmax {
      self.softmax = softmax;
    }
    self
  }

  /// 读取 JSON 覆盖文件并应用到预设上
  pub fn with_override_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    info!("读取模型配置覆盖文件: {}", path.display());
    let data = std::fs::read_to_string(path)?;
    let patch: ModelConfigOverride = serde_json::from_str(&data)?;
    debug!("配置覆盖项: {:?}", patch);
    Ok(self.apply(patch))
  }

  /// 生效配置的 JSON 形式，可直接作为覆盖文件使用
  pub fn to_json(&self) -> Result<String, ConfigError> {
    Ok(serde_json::to_string(self)?)
  }

  /// 构造检测器前的完整性检查，失败即不可启动
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.labels.is_empty() {
      return Err(ConfigError::EmptyLabels);
    }
    if self.colors.len() != self.labels.len() {
      return Err(ConfigError::ColorCount {
        labels: self.labels.len(),
        colors: self.colors.len(),
      });
    }
    if !(0.0..=1.0).contains(&self.threshold) {
      return Err(ConfigError::Threshold(self.threshold));
    }
    if self.canvas_w == 0 || self.canvas_h == 0 {
      return Err(ConfigError::Canvas(self.canvas_w, self.canvas_h));
    }
    if self.kind == ModelKind::TinyYolov2 {
      if self.anchors.is_empty() || self.anchors.len() % 2 != 0 {
        return Err(ConfigError::Anchors(self.anchors.len()));
      }
      if self.grid_w == 0 || self.grid_h == 0 {
        return Err(ConfigError::Grid(self.grid_w, self.grid_h));
      }
    }
    Ok(())
  }
}

// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/output.rs - 输出定义
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

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, model::DetectResult};

pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

pub mod draw;

mod event;
mod save_image_file;

pub use self::event::{DetectionEvent, EventOutput, EventSinkError, PendingEvents, events_of};
pub use self::save_image_file::{DEFAULT_OUTPUT_PATH, SaveImageFileError, SaveImageFileOutput};

/// 默认图像输出，路径为空时写到 `output/result.jpg`
pub const DEFAULT_IMAGE_OUTPUT_URL: &str = "image:///";
/// 默认事件输出，写入日志
pub const DEFAULT_EVENT_OUTPUT_URL: &str = "log:";

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("事件输出错误: {0}")]
  EventSinkError(#[from] EventSinkError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  EventOutput(EventOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      scheme if EventOutput::is_event_scheme(scheme) => {
        let output = EventOutput::from_url(url)?;
        Ok(OutputWrapper::EventOutput(output))
      }
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Render<Frame, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    self
      .prepare(frame, result, &events_of(result, &Utc::now()))?
      .commit()
  }
}

/// 已完成绘制、编码与序列化，只差写出的单个输出
enum PendingOutput<'a> {
  Image(&'a SaveImageFileOutput, Vec<u8>),
  Events(PendingEvents),
}

impl OutputWrapper {
  fn prepare(
    &self,
    frame: &Frame,
    result: &DetectResult,
    events: &[DetectionEvent],
  ) -> Result<PendingOutput<'_>, OutputError> {
    match self {
      OutputWrapper::SaveImageFileOutput(output) => {
        Ok(PendingOutput::Image(output, output.encode(frame, result)?))
      }
      OutputWrapper::EventOutput(output) => Ok(PendingOutput::Events(output.prepare(events)?)),
    }
  }
}

impl PendingOutput<'_> {
  fn commit(self) -> Result<(), OutputError> {
    match self {
      PendingOutput::Image(output, bytes) => Ok(output.save_encoded(&bytes)?),
      PendingOutput::Events(events) => Ok(events.commit()?),
    }
  }
}

/// 同一结果交给多个输出
///
/// 先为全部输出完成绘制、编码、序列化并打开事件文件，任一失败则整帧不写出；
/// 之后才依次写出。
#[derive(Default)]
pub struct Outputs(Vec<OutputWrapper>);

impl Outputs {
  pub fn from_urls<'a>(urls: impl IntoIterator<Item = &'a Url>) -> Result<Self, OutputError> {
    urls
      .into_iter()
      .map(OutputWrapper::from_url)
      .collect::<Result<Vec<_>, _>>()
      .map(Outputs)
  }

  pub fn push(&mut self, output: OutputWrapper) {
    self.0.push(output);
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl Render<Frame, DetectResult> for Outputs {
  type Error = OutputError;

  fn render_result(&self, frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    let events = events_of(result, &Utc::now());
    let pending = self
      .0
      .iter()
      .map(|output| output.prepare(frame, result, &events))
      .collect::<Result<Vec<_>, _>>()?;
    for output in pending {
      output.commit()?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;
  use std::time::Duration;

  #[test]
  fn outputs_fan_out_to_every_sink() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("result.png");
    let events_path = dir.path().join("events.jsonl");
    let urls = [
      Url::parse(&format!("image://{}", image_path.display())).unwrap(),
      Url::parse(&format!("jsonl://{}", events_path.display())).unwrap(),
      Url::parse("log:").unwrap(),
    ];
    let outputs = Outputs::from_urls(&urls).unwrap();
    assert_eq!(outputs.len(), 3);

    let frame = Frame::new(0, "test", RgbImage::new(40, 30));
    let result = DetectResult {
      items: vec![crate::model::DetectItem {
        class_id: 0,
        label: "neutral".to_string(),
        color: [128, 128, 128],
        score: 0.8,
        bbox: [0, 0, 40, 30],
      }]
      .into_boxed_slice(),
      image_size: (40, 30),
      inference_time: Duration::from_millis(3),
    };
    outputs.render_result(&frame, &result).unwrap();

    assert!(image_path.exists());
    assert_eq!(std::fs::read_to_string(&events_path).unwrap().lines().count(), 1);
  }

  #[test]
  fn failing_sink_leaves_no_partial_output() {
    let dir = tempfile::tempdir().unwrap();
    let image_path = dir.path().join("result.png");
    let urls = [
      Url::parse(&format!("image://{}", image_path.display())).unwrap(),
      Url::parse(&format!("jsonl://{}", dir.path().display())).unwrap(),
    ];
    let outputs = Outputs::from_urls(&urls).unwrap();

    let frame = Frame::new(0, "test", RgbImage::new(40, 30));
    let result = DetectResult {
      items: vec![crate::model::DetectItem {
        class_id: 0,
        label: "person".to_string(),
        color: [255, 0, 0],
        score: 0.9,
        bbox: [1, 1, 20, 20],
      }]
      .into_boxed_slice(),
      image_size: (40, 30),
      inference_time: Duration::from_millis(3),
    };

    assert!(matches!(
      outputs.render_result(&frame, &result),
      Err(OutputError::EventSinkError(_))
    ));
    assert!(!image_path.exists());
  }

  #[test]
  fn default_urls_write_relative_image_and_log_events() {
    let urls = [
      Url::parse(DEFAULT_IMAGE_OUTPUT_URL).unwrap(),
      Url::parse(DEFAULT_EVENT_OUTPUT_URL).unwrap(),
    ];
    let outputs = Outputs::from_urls(&urls).unwrap();
    assert_eq!(outputs.len(), 2);
    match &outputs.0[0] {
      OutputWrapper::SaveImageFileOutput(output) => {
        assert_eq!(output.path(), std::path::Path::new(DEFAULT_OUTPUT_PATH));
        assert!(output.path().is_relative());
      }
      _ => panic!("first default output should be an image"),
    }
    assert!(matches!(
      &outputs.0[1],
      OutputWrapper::EventOutput(EventOutput::Log)
    ));
  }

  #[test]
  fn unknown_output_scheme_is_rejected() {
    let url = Url::parse("rtsp://localhost:8554/live").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch(_))
    ));
  }
}

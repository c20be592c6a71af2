// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/output/event.rs - 检测事件输出
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

use std::{
  fs::{File, OpenOptions},
  io::Write,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl,
  frame::Frame,
  model::{DetectItem, DetectResult},
  output::Render,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum EventSinkError {
  #[error("事件序列化错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("事件写入 {path} 失败: {source}")]
  Io {
    path: String,
    source: std::io::Error,
  },
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 每个检测结果对应的一条事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
  #[serde(rename = "Label")]
  pub label: String,
  #[serde(rename = "Confidence")]
  pub confidence: String,
  #[serde(rename = "Position")]
  pub position: [i32; 4],
  #[serde(rename = "TimeStamp")]
  pub timestamp: String,
}

impl DetectionEvent {
  pub fn new(item: &DetectItem, time: &DateTime<Utc>) -> Self {
    Self {
      label: item.label.clone(),
      confidence: format!("{:6.4}", item.score),
      position: item.bbox,
      timestamp: time.format(TIMESTAMP_FORMAT).to_string(),
    }
  }
}

/// 同一帧的全部事件共用一个时间戳
pub fn events_of(result: &DetectResult, time: &DateTime<Utc>) -> Vec<DetectionEvent> {
  result.iter().map(|item| DetectionEvent::new(item, time)).collect()
}

/// `log:` 写入日志；`jsonl:///path` 每个事件追加一行 JSON
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutput {
  Log,
  JsonLines(PathBuf),
}

impl FromUrl for EventOutput {
  type Error = EventSinkError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "log" => Ok(EventOutput::Log),
      "jsonl" => Ok(EventOutput::JsonLines(PathBuf::from(url.path()))),
      other => Err(EventSinkError::SchemeMismatch(format!(
        "期望事件输出 'log' 或 'jsonl', 实际 '{}'",
        other
      ))),
    }
  }
}

impl EventOutput {
  pub fn is_event_scheme(scheme: &str) -> bool {
    matches!(scheme, "log" | "jsonl")
  }

  /// 序列化事件并打开目标文件，尚不写入任何内容
  pub fn prepare(&self, events: &[DetectionEvent]) -> Result<PendingEvents, EventSinkError> {
    if events.is_empty() {
      return Ok(PendingEvents::Empty);
    }
    match self {
      EventOutput::Log => Ok(PendingEvents::Log(
        events
          .iter()
          .map(serde_json::to_string)
          .collect::<Result<_, _>>()?,
      )),
      EventOutput::JsonLines(path) => {
        let mut buffer = Vec::new();
        for event in events {
          serde_json::to_writer(&mut buffer, event)?;
          buffer.push(b'\n');
        }
        let file = open_append(path)?;
        Ok(PendingEvents::File {
          path: path.clone(),
          file,
          buffer,
        })
      }
    }
  }

  pub fn publish(&self, events: &[DetectionEvent]) -> Result<(), EventSinkError> {
    self.prepare(events)?.commit()
  }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EventSinkError + '_ {
  move |source| EventSinkError::Io {
    path: path.display().to_string(),
    source,
  }
}

fn open_append(path: &Path) -> Result<File, EventSinkError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(io_error(path))?;
  }
  OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(io_error(path))
}

/// 已序列化、等待写出的事件
pub enum PendingEvents {
  Empty,
  Log(Vec<String>),
  File {
    path: PathBuf,
    file: File,
    buffer: Vec<u8>,
  },
}

impl PendingEvents {
  pub fn commit(self) -> Result<(), EventSinkError> {
    match self {
      PendingEvents::Empty => Ok(()),
      PendingEvents::Log(lines) => {
        for line in lines {
          info!("detection result: {}", line);
        }
        Ok(())
      }
      PendingEvents::File {
        path,
        mut file,
        buffer,
      } => {
        file.write_all(&buffer).map_err(io_error(&path))?;
        debug!("追加 {} 字节事件到 {}", buffer.len(), path.display());
        Ok(())
      }
    }
  }
}

impl Render<Frame, DetectResult> for EventOutput {
  type Error = EventSinkError;

  fn render_result(&self, _frame: &Frame, result: &DetectResult) -> Result<(), Self::Error> {
    self.publish(&events_of(result, &Utc::now()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;
  use std::time::Duration;

  fn result() -> DetectResult {
    DetectResult {
      items: vec![
        DetectItem {
          class_id: 14,
          label: "person".to_string(),
          color: [255, 0, 0],
          score: 0.9,
          bbox: [293, 211, 347, 269],
        },
        DetectItem {
          class_id: 2,
          label: "bird".to_string(),
          color: [0, 255, 0],
          score: 0.51234,
          bbox: [0, 0, 10, 10],
        },
      ]
      .into_boxed_slice(),
      image_size: (640, 480),
      inference_time: Duration::from_millis(12),
    }
  }

  #[test]
  fn event_json_layout() {
    let time = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
    let events = events_of(&result(), &time);
    let json = serde_json::to_string(&events[0]).unwrap();
    assert_eq!(
      json,
      r#"{"Label":"person","Confidence":"0.9000","Position":[293,211,347,269],"TimeStamp":"2026-03-04 05:06:07"}"#
    );
    assert_eq!(events[1].confidence, "0.5123");
  }

  #[test]
  fn jsonl_sink_appends_one_line_per_detection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events/out.jsonl");
    let url = Url::parse(&format!("jsonl://{}", path.display())).unwrap();
    let sink = EventOutput::from_url(&url).unwrap();
    let frame = Frame::new(0, "test", image::RgbImage::new(1, 1));

    sink.render_result(&frame, &result()).unwrap();
    sink.render_result(&frame, &result()).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 4);
    let event: DetectionEvent = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(event.label, "person");
    assert_eq!(event.position, [293, 211, 347, 269]);
  }

  #[test]
  fn empty_result_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.jsonl");
    let sink = EventOutput::JsonLines(path.clone());
    let empty = DetectResult {
      items: Box::new([]),
      image_size: (1, 1),
      inference_time: Duration::ZERO,
    };
    sink.publish(&events_of(&empty, &Utc::now())).unwrap();
    assert!(!path.exists());
  }

  #[test]
  fn unopenable_file_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let sink = EventOutput::JsonLines(dir.path().to_path_buf());
    let events = events_of(&result(), &Utc::now());
    assert!(matches!(sink.prepare(&events), Err(EventSinkError::Io { .. })));
  }

  #[test]
  fn scheme_selects_sink() {
    assert_eq!(
      EventOutput::from_url(&Url::parse("log:").unwrap()).unwrap(),
      EventOutput::Log
    );
    assert!(EventOutput::from_url(&Url::parse("mqtt://broker").unwrap()).is_err());
  }
}

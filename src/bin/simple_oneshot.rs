// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/bin/simple_oneshot.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use url::Url;

use shanan_decode::{
  FromUrl,
  input::InputWrapper,
  model::DetectorBuilder,
  output::{DEFAULT_EVENT_OUTPUT_URL, DEFAULT_IMAGE_OUTPUT_URL, Outputs},
  task::{OneShotTask, Task},
};
use tracing::info;

/// 对一张图像执行检测并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 tiny-yolov2:///models/model.onnx?threshold=0.4
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///data/test.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 标注图像输出，默认写到 output/result.jpg
  #[arg(long, value_name = "OUTPUT", default_value = DEFAULT_IMAGE_OUTPUT_URL)]
  pub output: Url,
  /// 检测事件输出，例如 log: 或 jsonl:///output/events.jsonl
  #[arg(long, value_name = "EVENTS", default_value = DEFAULT_EVENT_OUTPUT_URL)]
  pub events: Vec<Url>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let input = InputWrapper::from_url(&args.input)?;
  let detector = DetectorBuilder::from_url(&args.model)?.build()?;
  let outputs = Outputs::from_urls(std::iter::once(&args.output).chain(&args.events))?;

  OneShotTask.run_task(input, detector, outputs)?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn outputs_default_to_relative_image_and_log_events() {
    let args = Args::try_parse_from([
      "simple-oneshot",
      "--model",
      "yolov3:///models/yolov3.onnx",
      "--input",
      "image:///data/test.jpg",
    ])
    .unwrap();
    assert_eq!(args.output.as_str(), DEFAULT_IMAGE_OUTPUT_URL);
    assert_eq!(args.events.len(), 1);
    assert_eq!(args.events[0].scheme(), "log");
  }
}

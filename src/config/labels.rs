// 该文件是 Shanan Decode （山南西风·解码） 项目的一部分。
// src/config/labels.rs - 各模型的类别与配色表
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

/// PASCAL VOC 类别（Tiny YOLOv2）
pub const VOC_LABELS: [&str; 20] = [
  "aeroplane",
  "bicycle",
  "bird",
  "boat",
  "bottle",
  "bus",
  "car",
  "cat",
  "chair",
  "cow",
  "dining table",
  "dog",
  "horse",
  "motorbike",
  "person",
  "potted plant",
  "sheep",
  "sofa",
  "train",
  "tv monitor",
];

/// COCO 类别（YOLOv3，Faster R-CNN 在前面多一个背景类）
pub const COCO_LABELS: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorbike",
  "aeroplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "sofa",
  "pottedplant",
  "bed",
  "diningtable",
  "toilet",
  "tvmonitor",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub const BACKGROUND_LABEL: &str = "__background";

/// FER+ 表情类别
pub const EMOTION_LABELS: [&str; 8] = [
  "neutral",
  "happiness",
  "surprise",
  "sadness",
  "anger",
  "disgust",
  "fear",
  "contempt",
];

/// 20 色基础调色板，类别多于 20 时循环使用
pub const BASE_PALETTE: [[u8; 3]; 20] = [
  [255, 0, 0],
  [0, 255, 0],
  [0, 0, 255],
  [128, 0, 0],
  [0, 128, 0],
  [0, 0, 128],
  [255, 255, 0],
  [0, 255, 255],
  [255, 0, 255],
  [128, 128, 0],
  [0, 128, 128],
  [128, 0, 128],
  [255, 128, 128],
  [128, 255, 128],
  [128, 128, 255],
  [128, 64, 64],
  [64, 128, 64],
  [64, 64, 128],
  [255, 64, 64],
  [64, 255, 64],
];

pub const BACKGROUND_COLOR: [u8; 3] = [0, 0, 0];

pub const EMOTION_PALETTE: [[u8; 3]; 8] = [
  [255, 0, 0],
  [0, 255, 0],
  [0, 0, 255],
  [0, 255, 255],
  [255, 0, 255],
  [255, 255, 0],
  [0, 0, 64],
  [0, 64, 0],
];

/// 生成与类别数等长的循环调色板
pub fn cycled_palette(len: usize) -> Vec<[u8; 3]> {
  BASE_PALETTE.iter().copied().cycle().take(len).collect()
}

pub fn to_owned_labels(labels: &[&str]) -> Vec<String> {
  labels.iter().map(|s| s.to_string()).collect()
}

// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/matcher.rs - 基于 IoU 的跨帧框匹配
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

use crate::bbox::Corners;

/// 默认匹配阈值
pub const MATCH_IOU_THRESHOLD: f32 = 0.3;

/// 两角点框的交并比，并集不为正时返回 0
pub fn box_iou(a: &Corners, b: &Corners) -> f32 {
  let x1 = a.x1.max(b.x1);
  let y1 = a.y1.max(b.y1);
  let x2 = a.x2.min(b.x2);
  let y2 = a.y2.min(b.y2);

  let intersection = if x1 < x2 && y1 < y2 {
    (x2 - x1) as i64 * (y2 - y1) as i64
  } else {
    0
  };

  let union = a.area() + b.area() - intersection;
  if union <= 0 {
    return 0.0;
  }

  intersection as f32 / union as f32
}

/// IoU 严格大于 [`MATCH_IOU_THRESHOLD`] 时认为是同一目标
pub fn match_boxes(a: &Corners, b: &Corners) -> bool {
  IouMatcher::default().matches(a, b)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IouMatcher {
  pub threshold: f32,
}

impl IouMatcher {
  pub fn new(threshold: f32) -> Self {
    Self { threshold }
  }

  pub fn matches(&self, a: &Corners, b: &Corners) -> bool {
    let iou = box_iou(a, b);
    debug!("匹配 {:?} 与 {:?}, IoU = {:.4}", a, b, iou);
    iou > self.threshold
  }
}

impl Default for IouMatcher {
  fn default() -> Self {
    Self::new(MATCH_IOU_THRESHOLD)
  }
}

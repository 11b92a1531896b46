// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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
  path::{Path, PathBuf},
  sync::Arc,
};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  bbox::BBox,
  color::{ColorTable, DominantColorClassifier, KitColor},
  labels::LabelTable,
  model::{DetectResult, Detection},
};

/// 常见发行版自带的字体
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

// 字号比例 1.0 对应的像素高度
const FONT_BASE_PX: f32 = 30.0;
const LINE_THICKNESS: i32 = 2;
const ARC_START_DEG: i32 = -45;
const ARC_END_DEG: i32 = 235;
const ARC_STEP_DEG: usize = 5;
const ELLIPSE_MINOR_RATIO: f32 = 0.35;
const LABEL_OFFSET_RATIO: f32 = 1.5;

const SHADOW_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const SHADOW_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Error, Debug)]
pub enum FontError {
  #[error("无法读取字体文件 {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("无效的字体文件 {path}: {source}")]
  Invalid {
    path: PathBuf,
    #[source]
    source: ab_glyph::InvalidFont,
  },
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontVec, FontError> {
  let path = path.as_ref();
  let data = std::fs::read(path).map_err(|source| FontError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  FontVec::try_from_vec(data).map_err(|source| FontError::Invalid {
    path: path.to_path_buf(),
    source,
  })
}

/// 绘制风格
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStyle {
  /// 图片模式：按球衣主色绘制矩形、半椭圆与类别名
  Kit,
  /// 视频模式：绿色半椭圆 + 黑色类别名
  Shadow,
}

impl RenderStyle {
  pub fn font_scale(self) -> f32 {
    match self {
      RenderStyle::Kit => 0.5,
      RenderStyle::Shadow => 0.6,
    }
  }
}

/// 一个已绘制的检测
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  pub bbox: BBox,
  pub class_id: usize,
  pub label: String,
  pub kit: Option<KitColor>,
  pub color: Rgb<u8>,
}

pub struct Painter {
  style: RenderStyle,
  labels: Arc<LabelTable>,
  classifier: DominantColorClassifier,
  render_classes: Option<Vec<usize>>,
  font: Option<FontVec>,
  fallback: Rgb<u8>,
  thickness: i32,
}

impl Painter {
  pub fn new(style: RenderStyle, labels: Arc<LabelTable>) -> Self {
    Self {
      style,
      labels,
      classifier: DominantColorClassifier::default(),
      render_classes: None,
      font: None,
      fallback: KitColor::Blue.display(),
      thickness: LINE_THICKNESS,
    }
  }

  pub fn with_colors(mut self, table: ColorTable) -> Self {
    self.classifier = DominantColorClassifier::new(table);
    self
  }

  /// 只绘制这些类别，`None` 表示全部绘制
  pub fn with_render_classes(mut self, classes: Option<Vec<usize>>) -> Self {
    self.render_classes = classes;
    self
  }

  /// 没有主色时使用的颜色
  pub fn with_fallback(mut self, color: Rgb<u8>) -> Self {
    self.fallback = color;
    self
  }

  pub fn with_font(mut self, font: FontVec) -> Self {
    self.font = Some(font);
    self
  }

  /// 加载失败时只绘制图形，不绘制文字
  pub fn with_font_file(self, path: impl AsRef<Path>) -> Self {
    match load_font(path) {
      Ok(font) => self.with_font(font),
      Err(e) => {
        warn!("{}，将跳过标签绘制", e);
        self
      }
    }
  }

  pub fn style(&self) -> RenderStyle {
    self.style
  }

  fn should_render(&self, det: &Detection) -> bool {
    self
      .render_classes
      .as_ref()
      .is_none_or(|classes| classes.contains(&det.class_id))
  }

  /// 在原图上绘制，返回实际绘制的内容
  pub fn paint(&self, image: &mut RgbImage, result: &DetectResult) -> Vec<Annotation> {
    let selected: Vec<&Detection> = result
      .items
      .iter()
      .filter(|det| self.should_render(det))
      .collect();
    if selected.is_empty() {
      return Vec::new();
    }

    // 先在未绘制的图像上统计颜色
    let masks = match self.style {
      RenderStyle::Kit => Some(self.classifier.masks(image)),
      RenderStyle::Shadow => None,
    };

    let mut annotations = Vec::with_capacity(selected.len());
    for det in selected {
      let label = self.labels.name(det.class_id).to_string();
      let annotation = match &masks {
        Some(masks) => {
          let kit = masks.dominant(&det.bbox);
          let color = kit.map(KitColor::display).unwrap_or(self.fallback);
          self.draw_rect(image, &det.bbox, color);
          self.draw_arc(image, &det.bbox, color);
          self.draw_label(image, &det.bbox, &label, color);
          Annotation {
            bbox: det.bbox,
            class_id: det.class_id,
            label,
            kit,
            color,
          }
        }
        None => {
          self.draw_arc(image, &det.bbox, SHADOW_COLOR);
          self.draw_label(image, &det.bbox, &label, SHADOW_TEXT_COLOR);
          Annotation {
            bbox: det.bbox,
            class_id: det.class_id,
            label,
            kit: None,
            color: SHADOW_COLOR,
          }
        }
      };
      debug!(
        "绘制 {} ({}, {}, {}x{}) 颜色 {:?}",
        annotation.label,
        det.bbox.x,
        det.bbox.y,
        det.bbox.width,
        det.bbox.height,
        annotation.color.0
      );
      annotations.push(annotation);
    }

    annotations
  }

  // 矩形包含 (x, y) 与 (x + w, y + h) 两个角点
  fn draw_rect(&self, image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    for t in 0..self.thickness {
      let width = bbox.width + 1 - 2 * t;
      let height = bbox.height + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(bbox.x + t, bbox.y + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  // 以框底边中点为圆心、长轴为框宽的半椭圆
  fn draw_arc(&self, image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>) {
    let center = (
      (bbox.x as f32 + bbox.width as f32 / 2.0).trunc(),
      bbox.bottom() as f32,
    );
    let major = bbox.width as f32;
    let minor = (ELLIPSE_MINOR_RATIO * bbox.width as f32).trunc();

    for t in 0..self.thickness {
      let (a, b) = (major - t as f32, minor - t as f32);
      if a <= 0.0 || b < 0.0 {
        break;
      }

      let mut prev: Option<(f32, f32)> = None;
      for deg in (ARC_START_DEG..=ARC_END_DEG).step_by(ARC_STEP_DEG) {
        let theta = (deg as f32).to_radians();
        let point = (center.0 + a * theta.cos(), center.1 + b * theta.sin());
        if let Some(start) = prev {
          draw_line_segment_mut(image, start, point, color);
        }
        prev = Some(point);
      }
    }
  }

  // 文字基线位于 y + 1.5h
  fn draw_label(&self, image: &mut RgbImage, bbox: &BBox, text: &str, color: Rgb<u8>) {
    let Some(font) = &self.font else {
      return;
    };
    if text.is_empty() {
      return;
    }

    let scale = PxScale::from(FONT_BASE_PX * self.style.font_scale());
    let (_, text_height) = text_size(scale, font, text);
    let baseline = bbox.y + (LABEL_OFFSET_RATIO * bbox.height as f32) as i32;
    draw_text_mut(
      image,
      color,
      bbox.x,
      baseline - text_height as i32,
      scale,
      font,
      text,
    );
  }
}

// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/color.rs - 球衣主色估计
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

//! 球衣主色估计
//!
//! 对整帧按固定 HSV 区间生成二值掩码，再统计检测框内的非零像素数，
//! 像素数最多的颜色即为主色。HSV 采用 8 位约定：H ∈ [0, 180)，S、V ∈ [0, 255]。

use std::{fmt, str::FromStr};

use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::bbox::BBox;

/// 候选球衣颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KitColor {
  Red,
  Yellow,
  Blue,
  Green,
  Black,
  White,
}

impl KitColor {
  pub const ALL: [KitColor; 6] = [
    KitColor::Red,
    KitColor::Yellow,
    KitColor::Blue,
    KitColor::Green,
    KitColor::Black,
    KitColor::White,
  ];

  pub fn name(self) -> &'static str {
    match self {
      KitColor::Red => "red",
      KitColor::Yellow => "yellow",
      KitColor::Blue => "blue",
      KitColor::Green => "green",
      KitColor::Black => "black",
      KitColor::White => "white",
    }
  }

  /// 绘制用的 RGB 颜色
  pub fn display(self) -> Rgb<u8> {
    match self {
      KitColor::Red => Rgb([255, 0, 0]),
      KitColor::Yellow => Rgb([255, 255, 0]),
      KitColor::Blue => Rgb([0, 0, 255]),
      KitColor::Green => Rgb([0, 255, 0]),
      KitColor::Black => Rgb([0, 0, 0]),
      KitColor::White => Rgb([255, 255, 255]),
    }
  }

  /// 默认 HSV 区间
  pub fn default_range(self) -> HsvRange {
    match self {
      KitColor::Red => HsvRange::new([0, 50, 50], [10, 255, 255]),
      KitColor::Yellow => HsvRange::new([20, 50, 50], [30, 255, 255]),
      KitColor::Blue => HsvRange::new([110, 50, 50], [130, 255, 255]),
      KitColor::Green => HsvRange::new([50, 50, 50], [70, 255, 255]),
      KitColor::Black => HsvRange::new([0, 0, 0], [180, 255, 30]),
      KitColor::White => HsvRange::new([0, 0, 200], [180, 20, 255]),
    }
  }
}

impl fmt::Display for KitColor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for KitColor {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    KitColor::ALL
      .into_iter()
      .find(|color| color.name().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("未知颜色: {}", s))
  }
}

/// 闭区间 `[lower, upper]`，逐通道比较
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
  pub lower: [u8; 3],
  pub upper: [u8; 3],
}

impl HsvRange {
  pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
    Self { lower, upper }
  }

  pub fn contains(&self, hsv: [u8; 3]) -> bool {
    (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
  }
}

/// 有序的颜色区间表，顺序决定计数相同时的胜者
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
  entries: Vec<(KitColor, HsvRange)>,
}

impl ColorTable {
  /// 默认启用的颜色：红、黄、黑、白
  pub fn kits() -> Self {
    Self {
      entries: [KitColor::Red, KitColor::Yellow, KitColor::Black, KitColor::White]
        .into_iter()
        .map(|color| (color, color.default_range()))
        .collect(),
    }
  }

  /// 追加一个颜色，已存在时忽略
  pub fn with_color(mut self, color: KitColor) -> Self {
    if !self.contains(color) {
      self.entries.push((color, color.default_range()));
    }
    self
  }

  pub fn contains(&self, color: KitColor) -> bool {
    self.entries.iter().any(|(c, _)| *c == color)
  }

  pub fn entries(&self) -> &[(KitColor, HsvRange)] {
    &self.entries
  }
}

impl Default for ColorTable {
  fn default() -> Self {
    Self::kits()
  }
}

/// RGB 像素转 8 位 HSV
pub fn rgb_to_hsv(pixel: Rgb<u8>) -> [u8; 3] {
  let [r, g, b] = pixel.0.map(i32::from);
  let v = r.max(g).max(b);
  let min = r.min(g).min(b);
  let diff = v - min;

  let s = if v == 0 {
    0
  } else {
    (diff as f32 * 255.0 / v as f32).round() as i32
  };

  let h = if diff == 0 {
    0.0
  } else if v == r {
    60.0 * (g - b) as f32 / diff as f32
  } else if v == g {
    120.0 + 60.0 * (b - r) as f32 / diff as f32
  } else {
    240.0 + 60.0 * (r - g) as f32 / diff as f32
  };
  let h = if h < 0.0 { h + 360.0 } else { h };

  let mut h = (h / 2.0).round() as i32;
  if h >= 180 {
    h -= 180;
  }

  [h as u8, s as u8, v as u8]
}

/// HSV 图像，三个通道依次为 H、S、V
#[derive(Debug, Clone)]
pub struct HsvImage {
  inner: RgbImage,
}

impl HsvImage {
  pub fn from_rgb(image: &RgbImage) -> Self {
    let mut inner = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
      inner.put_pixel(x, y, Rgb(rgb_to_hsv(*pixel)));
    }
    Self { inner }
  }

  pub fn width(&self) -> u32 {
    self.inner.width()
  }

  pub fn height(&self) -> u32 {
    self.inner.height()
  }

  pub fn get(&self, x: u32, y: u32) -> [u8; 3] {
    self.inner.get_pixel(x, y).0
  }

  /// 整幅图像的二值掩码，区间内为 255
  pub fn in_range(&self, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(self.width(), self.height());
    for (x, y, pixel) in self.inner.enumerate_pixels() {
      if range.contains(pixel.0) {
        mask.put_pixel(x, y, Luma([255]));
      }
    }
    mask
  }
}

/// 统计掩码在框内（已裁剪到图像范围）的非零像素数
pub fn count_non_zero(mask: &GrayImage, bbox: &BBox) -> u64 {
  let region = bbox.clamp_to(mask.width(), mask.height());
  if region.is_empty() {
    return 0;
  }

  let mut count = 0;
  for y in region.y..region.bottom() {
    for x in region.x..region.right() {
      if mask.get_pixel(x as u32, y as u32)[0] != 0 {
        count += 1;
      }
    }
  }
  count
}

/// 一帧内所有启用颜色的掩码，每帧只构建一次
pub struct ColorMasks {
  masks: Vec<(KitColor, GrayImage)>,
}

impl ColorMasks {
  pub fn build(frame: &RgbImage, table: &ColorTable) -> Self {
    let hsv = HsvImage::from_rgb(frame);
    let masks = table
      .entries()
      .iter()
      .map(|(color, range)| (*color, hsv.in_range(range)))
      .collect();
    Self { masks }
  }

  pub fn count(&self, color: KitColor, bbox: &BBox) -> Option<u64> {
    self
      .masks
      .iter()
      .find(|(c, _)| *c == color)
      .map(|(_, mask)| count_non_zero(mask, bbox))
  }

  /// 框内像素最多的颜色，全部为 0 时返回 `None`
  pub fn dominant(&self, bbox: &BBox) -> Option<KitColor> {
    let mut dominant = None;
    let mut max_count = 0;

    for (color, mask) in &self.masks {
      let count = count_non_zero(mask, bbox);
      if count > max_count {
        dominant = Some(*color);
        max_count = count;
      }
    }

    debug!(
      "框 ({}, {}, {}x{}) 主色: {:?} ({} 像素)",
      bbox.x, bbox.y, bbox.width, bbox.height, dominant, max_count
    );
    dominant
  }
}

/// 单框主色分类
#[derive(Debug, Clone, Default)]
pub struct DominantColorClassifier {
  table: ColorTable,
}

impl DominantColorClassifier {
  pub fn new(table: ColorTable) -> Self {
    Self { table }
  }

  pub fn table(&self) -> &ColorTable {
    &self.table
  }

  /// 为整帧构建掩码，供同一帧的多个框复用
  pub fn masks(&self, frame: &RgbImage) -> ColorMasks {
    ColorMasks::build(frame, &self.table)
  }

  pub fn classify(&self, frame: &RgbImage, bbox: &BBox) -> Option<KitColor> {
    self.masks(frame).dominant(bbox)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn paint(image: &mut RgbImage, bbox: BBox, color: Rgb<u8>) {
    for y in bbox.y..bbox.bottom() {
      for x in bbox.x..bbox.right() {
        image.put_pixel(x as u32, y as u32, color);
      }
    }
  }

  #[test]
  fn hsv_of_primary_colors() {
    assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), [0, 255, 255]);
    assert_eq!(rgb_to_hsv(Rgb([255, 255, 0])), [30, 255, 255]);
    assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])), [60, 255, 255]);
    assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])), [120, 255, 255]);
    assert_eq!(rgb_to_hsv(Rgb([255, 255, 255])), [0, 0, 255]);
    assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), [0, 0, 0]);
  }

  #[test]
  fn solid_white_frame_is_white() {
    let frame = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
    let classifier = DominantColorClassifier::default();
    assert_eq!(
      classifier.classify(&frame, &BBox::new(0, 0, 40, 40)),
      Some(KitColor::White)
    );
  }

  #[test]
  fn red_patch_inside_box_wins() {
    let mut frame = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
    paint(&mut frame, BBox::new(0, 0, 10, 10), Rgb([220, 10, 10]));

    let classifier = DominantColorClassifier::default();
    assert_eq!(
      classifier.classify(&frame, &BBox::new(0, 0, 10, 10)),
      Some(KitColor::Red)
    );
    // 框外的白色不影响框内计数
    let masks = classifier.masks(&frame);
    assert_eq!(masks.count(KitColor::White, &BBox::new(0, 0, 10, 10)), Some(0));
    assert_eq!(masks.dominant(&BBox::new(10, 10, 10, 10)), Some(KitColor::White));
  }

  #[test]
  fn larger_count_wins_and_ties_keep_table_order() {
    let mut frame = RgbImage::new(10, 10);
    paint(&mut frame, BBox::new(0, 0, 4, 10), Rgb([255, 0, 0]));
    paint(&mut frame, BBox::new(4, 0, 6, 10), Rgb([255, 255, 0]));
    let masks = DominantColorClassifier::default().masks(&frame);
    assert_eq!(masks.dominant(&BBox::new(0, 0, 10, 10)), Some(KitColor::Yellow));
    // 红 4 列、黄 4 列，计数相同时先出现的红色胜出
    assert_eq!(masks.dominant(&BBox::new(0, 0, 8, 10)), Some(KitColor::Red));
  }

  #[test]
  fn disabled_colors_yield_no_dominant_color() {
    let frame = RgbImage::from_pixel(10, 10, Rgb([0, 0, 255]));
    let bbox = BBox::new(0, 0, 10, 10);

    let classifier = DominantColorClassifier::default();
    assert_eq!(classifier.classify(&frame, &bbox), None);

    let with_blue = DominantColorClassifier::new(ColorTable::kits().with_color(KitColor::Blue));
    assert_eq!(with_blue.classify(&frame, &bbox), Some(KitColor::Blue));
  }

  #[test]
  fn out_of_bounds_box_is_clamped() {
    let frame = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
    let masks = DominantColorClassifier::default().masks(&frame);
    assert_eq!(masks.count(KitColor::Black, &BBox::new(-5, -5, 10, 10)), Some(25));
    assert_eq!(masks.dominant(&BBox::new(50, 50, 10, 10)), None);
  }

  #[test]
  fn color_names_parse() {
    assert_eq!("Blue".parse::<KitColor>(), Ok(KitColor::Blue));
    assert!("purple".parse::<KitColor>().is_err());
    assert!(!ColorTable::kits().contains(KitColor::Green));
    assert_eq!(ColorTable::kits().with_color(KitColor::Red).entries().len(), 4);
  }
}

// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/bbox.rs - 边界框几何
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

/// 像素坐标下的边界框，左上角 + 宽高
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BBox {
  /// 左上角 x 坐标
  pub x: i32,
  /// 左上角 y 坐标
  pub y: i32,
  /// 宽度
  pub width: i32,
  /// 高度
  pub height: i32,
}

/// 两角点表示的边界框 `(x1, y1, x2, y2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Corners {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BBox {
  pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      return 0;
    }
    self.width as i64 * self.height as i64
  }

  pub fn right(&self) -> i32 {
    self.x.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.y.saturating_add(self.height)
  }

  pub fn is_empty(&self) -> bool {
    self.width <= 0 || self.height <= 0
  }

  pub fn to_corners(&self) -> Corners {
    Corners {
      x1: self.x,
      y1: self.y,
      x2: self.right(),
      y2: self.bottom(),
    }
  }

  /// 两个框的交集，不相交时返回空框
  pub fn intersect(&self, other: &BBox) -> BBox {
    let x1 = self.x.max(other.x);
    let y1 = self.y.max(other.y);
    let x2 = self.right().min(other.right());
    let y2 = self.bottom().min(other.bottom());

    if x2 <= x1 || y2 <= y1 {
      return BBox::default();
    }

    BBox::new(x1, y1, x2 - x1, y2 - y1)
  }

  /// 将框裁剪到 `width x height` 的图像范围内
  pub fn clamp_to(&self, width: u32, height: u32) -> BBox {
    let (w, h) = (width as i32, height as i32);
    let x1 = self.x.clamp(0, w);
    let y1 = self.y.clamp(0, h);
    let x2 = self.right().clamp(0, w);
    let y2 = self.bottom().clamp(0, h);

    BBox::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
  }

  /// 交并比，两个框面积之和为 0 时视为完全重叠
  pub fn overlap(&self, other: &BBox) -> f32 {
    let area_a = self.area();
    let area_b = other.area();
    if area_a + area_b == 0 {
      return 1.0;
    }

    let inter = self.intersect(other).area();
    inter as f32 / (area_a + area_b - inter) as f32
  }
}

impl From<BBox> for Corners {
  fn from(bbox: BBox) -> Self {
    bbox.to_corners()
  }
}

impl Corners {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 按 `(x2 - x1) * (y2 - y1)` 计算面积，不对反向框取绝对值
  pub fn area(&self) -> i64 {
    (self.x2 - self.x1) as i64 * (self.y2 - self.y1) as i64
  }
}

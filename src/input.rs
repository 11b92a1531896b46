// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use thiserror::Error;

use crate::{config::is_image_path, frame::Frame};

/// 输入类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
  /// 单张图片
  Image,
  /// 视频文件
  Video,
}

/// 帧来源，读取失败即视为流结束
pub trait InputSource: Iterator<Item = Frame> {
  fn kind(&self) -> InputKind;

  /// 源帧率（已知时）
  fn fps(&self) -> Option<f64> {
    None
  }

  /// 总帧数（已知时），用于估算剩余时间
  fn total_frames(&self) -> Option<u64> {
    None
  }
}

mod read_image_file;
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{GStreamerInput, GStreamerInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer 输入错误: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("不支持的输入格式: {0}")]
  UnsupportedFormat(String),
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
}

impl InputWrapper {
  /// 按扩展名打开输入：图片扩展名读取单张图片，其余交给视频解码
  pub fn open(path: &Path) -> Result<Self, InputError> {
    if is_image_path(path) {
      return Ok(InputWrapper::ReadImageFile(ImageFileInput::open(path)?));
    }

    #[cfg(feature = "gstreamer_input")]
    return Ok(InputWrapper::GStreamerInput(GStreamerInput::open(path)?));

    #[cfg(not(feature = "gstreamer_input"))]
    return Err(InputError::UnsupportedFormat(path.display().to_string()));
  }
}

impl Iterator for InputWrapper {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
    }
  }
}

impl InputSource for InputWrapper {
  fn kind(&self) -> InputKind {
    match self {
      InputWrapper::ReadImageFile(input) => input.kind(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.kind(),
    }
  }

  fn fps(&self) -> Option<f64> {
    match self {
      InputWrapper::ReadImageFile(input) => input.fps(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.fps(),
    }
  }

  fn total_frames(&self) -> Option<u64> {
    match self {
      InputWrapper::ReadImageFile(input) => input.total_frames(),
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.total_frames(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn opens_image_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("still.png");
    RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&path).unwrap();

    let mut input = InputWrapper::open(&path).unwrap();
    assert_eq!(input.kind(), InputKind::Image);
    assert_eq!(input.total_frames(), Some(1));
    let frame = input.next().unwrap();
    assert_eq!((frame.width(), frame.height()), (3, 2));
    assert!(input.next().is_none());
  }

  #[test]
  fn missing_image_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(InputWrapper::open(&dir.path().join("missing.jpg")).is_err());
  }
}

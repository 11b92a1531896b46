// 该文件是 Kitscan （球衣识别） 项目的一部分。
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

use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::config::is_image_path;

/// 输出写入器：逐帧接收已绘制的图像
pub trait OutputWriter {
  type Error;

  /// 写入一帧
  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error>;

  /// 完成写入，只应生效一次
  fn finish(&mut self) -> Result<(), Self::Error>;
}

impl<W: OutputWriter + ?Sized> OutputWriter for &mut W {
  type Error = W::Error;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    (**self).write_frame(image)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    (**self).finish()
  }
}

pub mod draw;

mod save_image_file;
pub use self::save_image_file::{ImageFileOutput, SaveImageFileError};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{GStreamerVideoOutput, GStreamerVideoOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[cfg(feature = "gstreamer_output")]
  #[error("GStreamer 视频输出错误: {0}")]
  GStreamerVideoOutputError(#[from] GStreamerVideoOutputError),
  #[error("不支持的输出格式: {0}")]
  UnsupportedFormat(String),
}

pub enum OutputWrapper {
  ImageFileOutput(ImageFileOutput),
  #[cfg(feature = "gstreamer_output")]
  GStreamerVideoOutput(GStreamerVideoOutput),
}

impl OutputWrapper {
  /// 按扩展名选择输出：图片扩展名保存单张图片，`mp4` 编码为视频
  pub fn create(path: &Path, fps: u32) -> Result<Self, OutputError> {
    if is_image_path(path) {
      return Ok(OutputWrapper::ImageFileOutput(ImageFileOutput::new(path)));
    }

    #[cfg(feature = "gstreamer_output")]
    if path
      .extension()
      .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
    {
      return Ok(OutputWrapper::GStreamerVideoOutput(
        GStreamerVideoOutput::new(path, fps),
      ));
    }

    let _ = fps;
    Err(OutputError::UnsupportedFormat(path.display().to_string()))
  }
}

impl OutputWriter for OutputWrapper {
  type Error = OutputError;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ImageFileOutput(output) => output.write_frame(image).map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideoOutput(output) => {
        output.write_frame(image).map_err(OutputError::from)
      }
    }
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::ImageFileOutput(output) => output.finish().map_err(OutputError::from),
      #[cfg(feature = "gstreamer_output")]
      OutputWrapper::GStreamerVideoOutput(output) => output.finish().map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn image_extensions_select_image_output() {
    let output = OutputWrapper::create(Path::new("output/a_yolo3.JPG"), 30).unwrap();
    assert!(matches!(output, OutputWrapper::ImageFileOutput(_)));
  }

  #[test]
  fn unknown_extension_is_rejected() {
    assert!(matches!(
      OutputWrapper::create(Path::new("output/a_yolo3.txt"), 30),
      Err(OutputError::UnsupportedFormat(_))
    ));
  }
}

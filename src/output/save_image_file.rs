// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;
use tracing::{info, warn};

use crate::output::OutputWriter;

/// 把绘制好的帧保存为单张图片，格式由扩展名决定
pub struct ImageFileOutput {
  path: PathBuf,
  written: u64,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
}

impl ImageFileOutput {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      written: 0,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl OutputWriter for ImageFileOutput {
  type Error = SaveImageFileError;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    if self.written > 0 {
      warn!("覆盖已保存的图像: {}", self.path.display());
    }

    image.save(&self.path)?;
    self.written += 1;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn creates_missing_output_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output").join("frame_yolo3.png");

    let mut output = ImageFileOutput::new(&path);
    let image = RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]));
    output.write_frame(&image).unwrap();
    output.finish().unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (4, 3));
    assert_eq!(saved.get_pixel(2, 1), &Rgb([10, 20, 30]));
  }

  #[test]
  fn unknown_format_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut output = ImageFileOutput::new(dir.path().join("frame.unknown"));
    let image = RgbImage::new(2, 2);
    assert!(matches!(
      output.write_frame(&image),
      Err(SaveImageFileError::ImageError(_))
    ));
  }
}

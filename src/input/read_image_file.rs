// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::Frame,
  input::{InputKind, InputSource},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("无法打开图像文件 {path}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("图像解码错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图片，只产生一帧
pub struct ImageFileInput {
  image: Option<RgbImage>,
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();
    let reader = ImageReader::open(path).map_err(|source| {
      error!("无法打开图像文件 {}: {}", path.display(), source);
      ImageFileInputError::IoError {
        path: path.to_path_buf(),
        source,
      }
    })?;
    let image = reader.with_guessed_format().map_err(|source| ImageFileInputError::IoError {
      path: path.to_path_buf(),
      source,
    })?;
    let image = image.decode()?.to_rgb8();
    info!(
      "读取图像 {}: {}x{}",
      path.display(),
      image.width(),
      image.height()
    );

    Ok(Self::from_image(image))
  }

  pub fn from_image(image: RgbImage) -> Self {
    Self { image: Some(image) }
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take().map(|image| Frame::new(image, 0))
  }
}

impl InputSource for ImageFileInput {
  fn kind(&self) -> InputKind {
    InputKind::Image
  }

  fn total_frames(&self) -> Option<u64> {
    Some(1)
  }
}

// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/model/darknet.rs - 基于 OpenCV DNN 的 Darknet 推理适配器
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

use std::{cell::RefCell, path::Path, time::Instant};

use image::RgbImage;
use opencv::{
  core::{CV_8UC3, CV_32F, Mat, Scalar, Size, Vector},
  dnn,
  prelude::*,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::ModelPaths,
  frame::{BLOB_SCALE, BLOB_SIDE},
  model::{
    Inference, LayerNameError, LayerOutput, OutLayerIds, RawOutput, RowLayout,
    resolve_output_layers,
  },
};

#[derive(Error, Debug)]
pub enum DarknetError {
  #[error("模型文件不存在: {0}")]
  MissingFile(String),
  #[error("OpenCV 错误: {0}")]
  OpenCv(#[from] opencv::Error),
  #[error("输出层错误: {0}")]
  Layer(#[from] LayerNameError),
}

/// YOLOv3 Darknet 网络，输出行布局为 [`RowLayout::DARKNET`]
pub struct DarknetModel {
  net: RefCell<dnn::Net>,
  output_layers: Vector<String>,
  blob_size: u32,
}

fn path_str(path: &Path) -> Result<String, DarknetError> {
  if !path.is_file() {
    return Err(DarknetError::MissingFile(path.display().to_string()));
  }
  Ok(path.to_string_lossy().into_owned())
}

impl DarknetModel {
  pub fn load(paths: &ModelPaths) -> Result<Self, DarknetError> {
    let config = path_str(&paths.config)?;
    let weights = path_str(&paths.weights)?;

    let now = Instant::now();
    let net = dnn::read_net_from_darknet(&config, &weights)?;
    info!("加载网络 {} / {}，耗时 {:.2?}", config, weights, now.elapsed());

    let layer_names = net.get_layer_names()?.to_vec();
    // OpenCV 的 Rust 绑定总是返回一维索引
    let ids = OutLayerIds::Flat(net.get_unconnected_out_layers()?.to_vec());
    let output_layers = resolve_output_layers(&layer_names, &ids)?;

    Ok(Self {
      net: RefCell::new(net),
      output_layers: Vector::from_iter(output_layers),
      blob_size: BLOB_SIDE,
    })
  }

  pub fn with_blob_size(mut self, side: u32) -> Self {
    self.blob_size = side;
    self
  }

  /// 按 `blobFromImage` 的方式构建网络输入：线性插值缩放、乘以 1/255、NCHW
  ///
  /// 图像已是 RGB 顺序，不需要再交换通道。
  fn blob_from_image(image: &RgbImage, side: u32) -> Result<Mat, DarknetError> {
    let mat = image_to_mat(image)?;
    let blob = dnn::blob_from_image(
      &mat,
      BLOB_SCALE as f64,
      Size::new(side as i32, side as i32),
      Scalar::default(),
      false,
      false,
      CV_32F,
    )?;
    Ok(blob)
  }
}

fn image_to_mat(image: &RgbImage) -> Result<Mat, DarknetError> {
  let mut mat = Mat::new_rows_cols_with_default(
    image.height() as i32,
    image.width() as i32,
    CV_8UC3,
    Scalar::all(0.0),
  )?;
  mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
  Ok(mat)
}

impl Inference for DarknetModel {
  type Error = DarknetError;

  fn row_layout(&self) -> RowLayout {
    RowLayout::DARKNET
  }

  fn forward(&self, image: &RgbImage) -> Result<RawOutput, Self::Error> {
    let input = Self::blob_from_image(image, self.blob_size)?;
    info!("输入张量尺寸: {:?}", input.mat_size().to_vec());

    let mut net = self.net.borrow_mut();
    net.set_input(&input, "", 1.0, Scalar::default())?;

    let now = Instant::now();
    let mut outputs = Vector::<Mat>::new();
    net.forward(&mut outputs, &self.output_layers)?;
    info!("YOLO 推理耗时 {:.6} 秒", now.elapsed().as_secs_f64());

    let mut layers = Vec::with_capacity(outputs.len());
    for mat in outputs.iter() {
      let mut rows = Vec::with_capacity(mat.rows().max(0) as usize);
      for r in 0..mat.rows() {
        rows.push(mat.at_row::<f32>(r)?.to_vec());
      }
      debug!("输出层 {} 行 x {} 列", mat.rows(), mat.cols());
      layers.push(LayerOutput::new(rows));
    }

    Ok(RawOutput::new(layers))
  }
}

// 该文件是 Kitscan （球衣识别） 项目的一部分。
// src/labels.rs - 类别标签表
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

use thiserror::Error;
use tracing::{error, info};

/// 未知类别的显示名称
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("无法读取标签文件 {path}: {source}")]
  Read {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("标签文件为空: {0}")]
  Empty(PathBuf),
  #[error("标签表中不存在类别: {0}")]
  UnknownClass(String),
}

/// 类别名称表，行号即 `class_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
  names: Box<[String]>,
}

impl LabelTable {
  /// 从换行分隔的文本构建，首尾空白会被去掉
  pub fn parse(text: &str) -> Self {
    let trimmed = text.trim();
    let names = if trimmed.is_empty() {
      Vec::new()
    } else {
      trimmed
        .split('\n')
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
    };

    Self {
      names: names.into_boxed_slice(),
    }
  }

  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| {
      error!("读取标签文件失败: {}", path.display());
      LabelError::Read {
        path: path.to_path_buf(),
        source,
      }
    })?;

    let table = Self::parse(&text);
    if table.is_empty() {
      return Err(LabelError::Empty(path.to_path_buf()));
    }

    info!("已加载 {} 个类别标签: {}", table.len(), path.display());
    Ok(table)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn get(&self, class_id: usize) -> Option<&str> {
    self.names.get(class_id).map(String::as_str)
  }

  /// 类别名称，越界时返回 [`UNKNOWN_LABEL`]
  pub fn name(&self, class_id: usize) -> &str {
    self.get(class_id).unwrap_or(UNKNOWN_LABEL)
  }

  pub fn position(&self, name: &str) -> Option<usize> {
    self.names.iter().position(|n| n == name)
  }

  /// 查找类别索引，不存在时报错
  pub fn resolve(&self, name: &str) -> Result<usize, LabelError> {
    self
      .position(name)
      .ok_or_else(|| LabelError::UnknownClass(name.to_string()))
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(String::as_str)
  }
}

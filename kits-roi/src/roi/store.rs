//! ROI 映射的增量持久化.
//!
//! 每完成一个 case 就把 **完整** 映射重写一遍, 而不是追加.
//! 这样崩溃后磁盘上的文件总是 "截至最后一次成功落盘的全部已完成
//! case", 而不会出现写了一半的 case.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::ser::Serialize;
use serde::Deserialize;
use serde_json::ser::PrettyFormatter;

use super::Roi;
use crate::dataset::case_name;

/// 持久化 ROI 映射错误.
#[derive(Debug)]
pub enum FlushError {
    /// 序列化/反序列化错误.
    Json(serde_json::Error),

    /// 底层 I/O 错误.
    Io(std::io::Error),
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(e) => write!(f, "roi json error: {e}"),
            Self::Io(e) => write!(f, "roi file io error: {e}"),
        }
    }
}

impl std::error::Error for FlushError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Json(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for FlushError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<std::io::Error> for FlushError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// 已完成 case 的 ROI 映射: `case_{i:05}` -> organ -> [`Roi`].
///
/// 映射在一次运行中单调增长. `BTreeMap` 保证键序稳定,
/// 因此同一内容的两次序列化字节完全一致.
#[derive(Debug, Default, serde::Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoiStore {
    cases: BTreeMap<String, BTreeMap<String, Roi>>,
}

impl RoiStore {
    /// 构建空映射.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录 (或静默覆盖) 一个 case 某 organ 的包围盒.
    pub fn record(&mut self, case: usize, organ: &str, roi: Roi) {
        self.cases
            .entry(case_name(case))
            .or_default()
            .insert(organ.to_owned(), roi);
    }

    /// 查询某 case 某 organ 的包围盒.
    pub fn get(&self, case: usize, organ: &str) -> Option<&Roi> {
        self.cases.get(&case_name(case))?.get(organ)
    }

    /// 已记录的 case 个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// 映射是否为空?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// 序列化为 4 空格缩进的 pretty JSON 字节串, 便于人工 diff.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut buf = Vec::with_capacity(4096);
        let fmt = PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
        self.cases.serialize(&mut ser)?;
        Ok(buf)
    }

    /// 把完整映射落盘到 `path`, 整体覆盖旧内容.
    ///
    /// 实际写入顺序是 "先写同目录临时文件, 再原子 rename 到目标路径",
    /// 中途崩溃不会截断已有文件.
    pub fn flush<P: AsRef<Path>>(&self, path: P) -> Result<(), FlushError> {
        let path = path.as_ref();
        let bytes = self.to_json_vec()?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// 从 `path` 读回先前落盘的映射.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FlushError> {
        let bytes = fs::read(path.as_ref())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

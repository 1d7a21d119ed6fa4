//! KiTS19 数据集操作.
//!
//! KiTS19 的磁盘布局: 数据根目录下每个 case 一个子目录, 形如
//! `case_00000/imaging.nii.gz` (+ 训练集的 `segmentation.nii.gz`).

use std::io;
use std::path::{Path, PathBuf};

use crate::roi::CaseIndices;
use crate::{slice_count, OpenVolumeError};

pub mod stream;

pub use stream::{SliceStack, SliceStream};

/// 格式化 case 标识符: `case_00000` 式的 5 位零填充形式.
///
/// 该形式同时是 case 目录名和 `roi.json` 中的键名.
#[inline]
pub fn case_name(index: usize) -> String {
    format!("case_{index:05}")
}

/// 给定数据根目录, 获取某 case 的目录全路径.
#[inline]
pub fn case_dir<P: AsRef<Path>>(root: P, index: usize) -> PathBuf {
    root.as_ref().join(case_name(index))
}

/// 给定数据根目录, 获取某 case 的 CT 扫描文件全路径.
#[inline]
pub fn imaging_path<P: AsRef<Path>>(root: P, index: usize) -> PathBuf {
    let mut p = case_dir(root, index);
    p.push("imaging.nii.gz");
    p
}

/// 扫描数据根目录下的所有 `case_*` 子目录, 返回升序 case 序号.
///
/// 不符合 `case_{数字}` 命名的目录项被静默跳过.
pub fn kits19_case_ids<P: AsRef<Path>>(root: P) -> io::Result<Vec<u32>> {
    let mut ids = Vec::new();
    for entry in root.as_ref().read_dir()? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(id) = name
            .to_str()
            .and_then(|s| s.strip_prefix("case_"))
            .and_then(|s| s.parse::<u32>().ok())
        else {
            continue;
        };
        ids.push(id);
    }
    ids.sort_unstable();
    Ok(ids)
}

/// 构建边界表时, 读取某 case 的 nifti header 失败.
#[derive(Debug)]
pub struct ScanIndicesError {
    /// 出错的 case 序号.
    pub case: u32,

    /// 底层打开错误.
    pub source: OpenVolumeError,
}

impl std::fmt::Display for ScanIndicesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "case {}: {}", self.case, self.source)
    }
}

impl std::error::Error for ScanIndicesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// 只读每个 case 的 nifti header, 构建展平切片流的 case 边界表.
///
/// `cases` 的顺序决定 case 在流中的顺序 (边界表下标与 `cases`
/// 下标一一对应, 而非 KiTS19 的原始 case 序号).
pub fn scan_case_indices<P: AsRef<Path>>(
    root: P,
    cases: &[u32],
) -> Result<CaseIndices, ScanIndicesError> {
    let root = root.as_ref();
    let mut lens = Vec::with_capacity(cases.len());
    for &case in cases {
        let z = slice_count(imaging_path(root, case as usize))
            .map_err(|e| ScanIndicesError { case, source: e })?;
        lens.push(z);
    }
    Ok(CaseIndices::from_case_lens(lens))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_name_zero_padding() {
        assert_eq!(case_name(0), "case_00000");
        assert_eq!(case_name(123), "case_00123");
        assert_eq!(case_name(20999), "case_20999");
    }

    #[test]
    fn test_imaging_path_layout() {
        let p = imaging_path("data", 7);
        assert_eq!(
            p,
            PathBuf::from("data").join("case_00007").join("imaging.nii.gz")
        );
    }
}

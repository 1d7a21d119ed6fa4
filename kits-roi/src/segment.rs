//! 语义分割推理接口.
//!
//! 网络结构、权重格式与推理后端都在该接口之后; 核心归约逻辑只依赖
//! "图像批进, 逐像素类别标签批出" 这一契约.

use std::fmt;

use ndarray::{Array3, Array4, ArrayView4};

/// 分割推理错误.
#[derive(Debug)]
pub enum SegmentError {
    /// 推理后端内部错误 (加载、执行等).
    Backend(Box<dyn std::error::Error + Send + Sync>),

    /// 后端输出形状不符合 (N, C, H, W) 约定.
    BadOutputShape(Vec<usize>),
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(e) => write!(f, "segmentation backend error: {e}"),
            Self::BadOutputShape(shape) => {
                write!(f, "expected (N, C, H, W) output, found shape {shape:?}")
            }
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(e) => Some(e.as_ref()),
            Self::BadOutputShape(_) => None,
        }
    }
}

/// 切片批量分割器.
///
/// 实现方接收 (N, C, H, W) 的 f32 图像批 (通道为邻域切片堆叠),
/// 返回 (N, H, W) 的 u8 逐像素标签批, 标签值遵循
/// [`consts::gray`](crate::consts::gray) 的约定.
pub trait SliceSegmenter {
    /// 对一个批次做分割推理.
    fn segment(&mut self, batch: &Array4<f32>) -> Result<Array3<u8>, SegmentError>;
}

/// 对 (N, C, H, W) 的逐类别得分做通道 argmax, 再经 `spec_classes`
/// 映射为标签值, 得到 (N, H, W) 的标签批.
///
/// `spec_classes` 的长度必须不小于通道数 `C`, 且 `C >= 1`, 否则 panic.
/// 粗定位场景传 [`consts::SPEC_CLASSES`](crate::consts::SPEC_CLASSES),
/// 把肿瘤类折叠进肾脏前景.
pub fn argmax_classes(scores: ArrayView4<'_, f32>, spec_classes: &[u8]) -> Array3<u8> {
    let (n, c, h, w) = scores.dim();
    assert!(c >= 1, "类别通道数不能为 0");
    assert!(
        spec_classes.len() >= c,
        "spec_classes 长度 {} 小于通道数 {c}",
        spec_classes.len()
    );

    let mut out = Array3::<u8>::zeros((n, h, w));
    for ((i, y, x), dst) in out.indexed_iter_mut() {
        let mut best = 0usize;
        let mut best_score = scores[(i, 0, y, x)];
        for k in 1..c {
            let score = scores[(i, k, y, x)];
            if score > best_score {
                best = k;
                best_score = score;
            }
        }
        *dst = spec_classes[best];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::SPEC_CLASSES;
    use ndarray::Array4;

    #[test]
    fn test_argmax_merges_tumor_into_kidney() {
        // 1 张 2x2 切片, 3 类得分.
        let mut scores = Array4::<f32>::zeros((1, 3, 2, 2));
        // (0, 0): 背景胜出.
        scores[(0, 0, 0, 0)] = 5.0;
        // (0, 1): 肾脏胜出.
        scores[(0, 1, 0, 1)] = 3.0;
        // (1, 0): 肿瘤胜出, 应折叠为肾脏.
        scores[(0, 2, 1, 0)] = 9.0;
        // (1, 1): 全 0 得分, 平局取最小通道 (背景).

        let labels = argmax_classes(scores.view(), &SPEC_CLASSES);
        assert_eq!(labels.dim(), (1, 2, 2));
        assert_eq!(labels[(0, 0, 0)], 0);
        assert_eq!(labels[(0, 0, 1)], 1);
        assert_eq!(labels[(0, 1, 0)], 1);
        assert_eq!(labels[(0, 1, 1)], 0);
    }

    #[test]
    #[should_panic(expected = "spec_classes")]
    fn test_argmax_rejects_short_class_table() {
        let scores = Array4::<f32>::zeros((1, 4, 2, 2));
        argmax_classes(scores.view(), &SPEC_CLASSES);
    }
}

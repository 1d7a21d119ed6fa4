//! 跨 case 切片流的包围盒归约器.
//!
//! 切片以 (预测 mask, 全局索引) 的形式按全局索引严格递增到达,
//! case 边界由外部给定的边界表描述. 归约器在每个 case 的最后一张
//! 切片处产出该 case 的包围盒, 随后为下一个 case 重置累积状态.

use std::fmt;

use itertools::Itertools;
use ndarray::ArrayView2;

use super::{bound_rect, Roi};

/// case 边界表.
///
/// 第 `k` 项是第 `k` 个 case 首张切片的全局索引, 末项是切片总数;
/// 即 case `k` 覆盖全局索引区间 `[start(k), start(k + 1))`.
/// 相邻两项相等代表一个零长度 case (构建即完成, 产出哨兵包围盒).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CaseIndices {
    starts: Vec<usize>,
}

/// 构建 case 边界表错误.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BoundaryTableError {
    /// 表项不足: 至少需要首项 0 和末项切片总数两项 (参数为实际项数).
    TooShort(usize),

    /// 首项不为 0, 边界表没有覆盖流的开头.
    FirstNotZero(usize),

    /// 表项在给定下标处发生递减.
    Decreasing(usize),
}

impl fmt::Display for BoundaryTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(n) => write!(f, "boundary table needs at least 2 entries, found {n}"),
            Self::FirstNotZero(v) => write!(f, "boundary table must start at 0, found {v}"),
            Self::Decreasing(at) => write!(f, "boundary table decreases at entry {at}"),
        }
    }
}

impl std::error::Error for BoundaryTableError {}

impl CaseIndices {
    /// 从原始边界数组构建. 数组必须以 0 开头、单调不减, 且至少有两项.
    pub fn new(starts: Vec<usize>) -> Result<Self, BoundaryTableError> {
        if starts.len() < 2 {
            return Err(BoundaryTableError::TooShort(starts.len()));
        }
        if starts[0] != 0 {
            return Err(BoundaryTableError::FirstNotZero(starts[0]));
        }
        if let Some((at, _)) = starts
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (a, b))| a > b)
        {
            return Err(BoundaryTableError::Decreasing(at + 1));
        }
        Ok(Self { starts })
    }

    /// 从每个 case 的切片数构建边界表 (前缀和).
    pub fn from_case_lens<I: IntoIterator<Item = usize>>(lens: I) -> Self {
        let mut starts = vec![0];
        let mut acc = 0usize;
        for len in lens {
            acc += len;
            starts.push(acc);
        }
        Self { starts }
    }

    /// case 个数.
    #[inline]
    pub fn cases(&self) -> usize {
        self.starts.len() - 1
    }

    /// 第 `k` 个 case 首张切片的全局索引.
    ///
    /// `k` 越界时 panic.
    #[inline]
    pub fn start(&self, k: usize) -> usize {
        self.starts[k]
    }

    /// 第 `k` 个 case 的切片数.
    ///
    /// `k` 越界时 panic.
    #[inline]
    pub fn case_len(&self, k: usize) -> usize {
        self.starts[k + 1] - self.starts[k]
    }

    /// 全部 case 的切片总数.
    #[inline]
    pub fn total_len(&self) -> usize {
        // 两个构造函数都保证表非空.
        *self.starts.last().unwrap()
    }
}

/// 归约器运行时错误.
///
/// 所有变体都代表输入流违反了契约; 归约器宁可报错中止,
/// 也不静默产出逻辑错误的包围盒.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReduceError {
    /// 全局索引不稠密或乱序: 期望值与实际值不符.
    IndexGap {
        /// 期望的下一个全局索引.
        expected: usize,

        /// 实际收到的全局索引.
        found: usize,
    },

    /// 所有 case 都已完成后仍收到切片.
    StreamOverrun {
        /// 多余切片的全局索引.
        index: usize,
    },

    /// 流在某个 case 中途结束.
    TruncatedStream {
        /// 未完成的 case 序号.
        case: usize,

        /// 该 case 应有的切片数.
        expected: usize,

        /// 实际收到的切片数.
        received: usize,
    },
}

impl fmt::Display for ReduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexGap { expected, found } => {
                write!(f, "global index must be dense: expected {expected}, found {found}")
            }
            Self::StreamOverrun { index } => {
                write!(f, "slice {index} arrived after the last case closed")
            }
            Self::TruncatedStream {
                case,
                expected,
                received,
            } => write!(
                f,
                "stream ended inside case {case}: got {received} of {expected} slices"
            ),
        }
    }
}

impl std::error::Error for ReduceError {}

/// 一个已完成 case 的归约结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CaseRoi {
    /// case 序号 (边界表下标).
    pub case: usize,

    /// 该 case 的包围盒. 全背景 case 为哨兵初值.
    pub roi: Roi,
}

/// 把全局有序切片流归约为逐 case 包围盒的状态机.
///
/// 每个 case 经历 "累积 -> 完成" 两个阶段: [`Self::push`] 逐张吸收切片,
/// 在该 case 的最后一张切片处产出 [`CaseRoi`] 并重置累积盒.
/// 零长度 case 在其位置被越过时立即以哨兵包围盒完成.
///
/// # 契约
///
/// `push` 的全局索引必须从 0 开始、稠密且严格递增 (即每次恰好加一),
/// 否则返回 [`ReduceError`]. 该检查把上游数据装载的乱序/丢片问题
/// 暴露为显式错误.
#[derive(Debug)]
pub struct RoiReducer {
    bounds: CaseIndices,

    /// 当前累积中的 case 序号.
    case: usize,

    /// 当前 case 的运行中包围盒.
    acc: Roi,

    /// 期望的下一个全局索引.
    cursor: usize,
}

impl RoiReducer {
    /// 以给定边界表初始化. 归约器从 case 0、全局索引 0 开始.
    pub fn new(bounds: CaseIndices) -> Self {
        Self {
            bounds,
            case: 0,
            acc: Roi::empty(),
            cursor: 0,
        }
    }

    /// 所有 case 是否都已完成?
    #[inline]
    pub fn finished(&self) -> bool {
        self.case >= self.bounds.cases()
    }

    /// 当前 case 的运行中包围盒. 仅用于诊断/可视化.
    #[inline]
    pub fn current(&self) -> &Roi {
        &self.acc
    }

    /// 边界表.
    #[inline]
    pub fn bounds(&self) -> &CaseIndices {
        &self.bounds
    }

    /// 吸收一张切片. 返回因此完成的所有 case (可能为空;
    /// 零长度 case 与真实 case 可能在同一次调用中先后完成).
    ///
    /// `mask` 为该切片的预测标签 (背景为 0), `global_index` 为其在
    /// 展平切片流中的位置.
    pub fn push(
        &mut self,
        mask: ArrayView2<'_, u8>,
        global_index: usize,
    ) -> Result<Vec<CaseRoi>, ReduceError> {
        if global_index != self.cursor {
            return Err(ReduceError::IndexGap {
                expected: self.cursor,
                found: global_index,
            });
        }

        let mut done = self.skip_empty_cases();
        if self.finished() {
            return Err(ReduceError::StreamOverrun {
                index: global_index,
            });
        }

        let local = global_index - self.bounds.start(self.case);
        if let Some(rect) = bound_rect(mask) {
            self.acc.absorb(&rect, local);
        }

        // 该 case 的最后一张切片: 定格包围盒, 重置累积状态.
        if local + 1 == self.bounds.case_len(self.case) {
            done.push(self.close_current());
        }
        self.cursor += 1;

        Ok(done)
    }

    /// 流结束. 结清尾部的零长度 case; 若有真实 case 未收满切片,
    /// 返回 [`ReduceError::TruncatedStream`].
    pub fn finish(mut self) -> Result<Vec<CaseRoi>, ReduceError> {
        let done = self.skip_empty_cases();
        if !self.finished() {
            return Err(ReduceError::TruncatedStream {
                case: self.case,
                expected: self.bounds.case_len(self.case),
                received: self.cursor - self.bounds.start(self.case),
            });
        }
        Ok(done)
    }

    /// 越过当前位置上所有零长度 case, 每个都以哨兵包围盒完成.
    fn skip_empty_cases(&mut self) -> Vec<CaseRoi> {
        let mut done = Vec::new();
        while !self.finished() && self.bounds.case_len(self.case) == 0 {
            debug_assert!(self.acc.is_empty());
            done.push(self.close_current());
        }
        done
    }

    fn close_current(&mut self) -> CaseRoi {
        let finished = CaseRoi {
            case: self.case,
            roi: self.acc,
        };
        self.acc = Roi::empty();
        self.case += 1;
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 在 (16, 16) 切片上放一个前景矩形.
    fn mask_with_rect(x: usize, y: usize, w: usize, h: usize) -> Array2<u8> {
        let mut mask = Array2::<u8>::zeros((16, 16));
        mask.slice_mut(ndarray::s![y..y + h, x..x + w]).fill(1);
        mask
    }

    fn background() -> Array2<u8> {
        Array2::<u8>::zeros((16, 16))
    }

    #[test]
    fn test_boundary_table_validation() {
        assert_eq!(
            CaseIndices::new(vec![]),
            Err(BoundaryTableError::TooShort(0))
        );
        assert_eq!(
            CaseIndices::new(vec![0]),
            Err(BoundaryTableError::TooShort(1))
        );
        assert_eq!(
            CaseIndices::new(vec![3, 5]),
            Err(BoundaryTableError::FirstNotZero(3))
        );
        assert_eq!(
            CaseIndices::new(vec![0, 5, 4]),
            Err(BoundaryTableError::Decreasing(2))
        );

        let ok = CaseIndices::new(vec![0, 2, 5]).unwrap();
        assert_eq!(ok.cases(), 2);
        assert_eq!(ok.case_len(0), 2);
        assert_eq!(ok.case_len(1), 3);
        assert_eq!(ok.total_len(), 5);
    }

    #[test]
    fn test_from_case_lens() {
        let built = CaseIndices::from_case_lens([2, 0, 3]);
        assert_eq!(built.starts, vec![0, 2, 2, 5]);
        assert_eq!(built.cases(), 3);
        assert_eq!(built.case_len(1), 0);
    }

    #[test]
    fn test_concrete_two_slice_case() {
        // case 0: 切片 0 前景矩形 (5, 5, 3x3), 切片 1 全背景.
        let bounds = CaseIndices::from_case_lens([2]);
        let mut reducer = RoiReducer::new(bounds);

        assert!(reducer
            .push(mask_with_rect(5, 5, 3, 3).view(), 0)
            .unwrap()
            .is_empty());
        let done = reducer.push(background().view(), 1).unwrap();

        assert_eq!(done.len(), 1);
        assert_eq!(done[0].case, 0);
        assert_eq!(
            done[0].roi,
            Roi {
                min_x: 5,
                min_y: 5,
                min_z: 0,
                max_x: 8,
                max_y: 8,
                max_z: 0,
            }
        );
        assert!(reducer.finished());
        assert!(reducer.finish().unwrap().is_empty());
    }

    #[test]
    fn test_exactly_one_finalize_per_case() {
        let bounds = CaseIndices::from_case_lens([3, 2, 4]);
        let mut reducer = RoiReducer::new(bounds);

        let mut finalized = Vec::new();
        for i in 0..9 {
            finalized.extend(reducer.push(mask_with_rect(1, 2, 3, 4).view(), i).unwrap());
        }
        finalized.extend(reducer.finish().unwrap());

        let cases: Vec<usize> = finalized.iter().map(|c| c.case).collect();
        assert_eq!(cases, vec![0, 1, 2]);
    }

    #[test]
    fn test_z_is_case_local() {
        // case 1 的前景出现在它的第 0、2 张切片 (全局索引 3、5).
        let bounds = CaseIndices::from_case_lens([3, 3]);
        let mut reducer = RoiReducer::new(bounds);

        for i in 0..3 {
            reducer.push(background().view(), i).unwrap();
        }
        reducer.push(mask_with_rect(2, 2, 2, 2).view(), 3).unwrap();
        reducer.push(background().view(), 4).unwrap();
        let done = reducer.push(mask_with_rect(2, 2, 2, 2).view(), 5).unwrap();

        assert_eq!(done.len(), 1);
        let roi = done[0].roi;
        assert_eq!((roi.min_z, roi.max_z), (0, 2));
        assert!(roi.min_z >= 0 && roi.max_z < 3);
    }

    #[test]
    fn test_all_background_case_keeps_sentinels() {
        let bounds = CaseIndices::from_case_lens([3]);
        let mut reducer = RoiReducer::new(bounds);

        reducer.push(background().view(), 0).unwrap();
        reducer.push(background().view(), 1).unwrap();
        let done = reducer.push(background().view(), 2).unwrap();

        assert_eq!(done.len(), 1);
        let roi = done[0].roi;
        assert!(roi.is_empty());
        assert_eq!(
            (roi.min_x, roi.min_y, roi.min_z, roi.max_x, roi.max_y, roi.max_z),
            (10000, 10000, 10000, -1, -1, -1)
        );
    }

    #[test]
    fn test_degenerate_zero_length_case() {
        // 边界表 [0, 0, 5]: case 0 没有任何切片.
        let bounds = CaseIndices::new(vec![0, 0, 5]).unwrap();
        let mut reducer = RoiReducer::new(bounds);

        // 第一次 push 先结清 case 0 (哨兵), 再开始累积 case 1.
        let done = reducer.push(mask_with_rect(4, 4, 2, 2).view(), 0).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].case, 0);
        assert!(done[0].roi.is_empty());

        for i in 1..4 {
            assert!(reducer.push(background().view(), i).unwrap().is_empty());
        }
        let done = reducer.push(background().view(), 4).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].case, 1);
        assert_eq!((done[0].roi.min_z, done[0].roi.max_z), (0, 0));
    }

    #[test]
    fn test_trailing_zero_length_case_drained_by_finish() {
        let bounds = CaseIndices::new(vec![0, 2, 2]).unwrap();
        let mut reducer = RoiReducer::new(bounds);

        reducer.push(background().view(), 0).unwrap();
        let done = reducer.push(background().view(), 1).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].case, 0);

        let drained = reducer.finish().unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].case, 1);
        assert!(drained[0].roi.is_empty());
    }

    #[test]
    fn test_index_gap_is_detected() {
        let bounds = CaseIndices::from_case_lens([4]);
        let mut reducer = RoiReducer::new(bounds);

        reducer.push(background().view(), 0).unwrap();
        assert_eq!(
            reducer.push(background().view(), 2),
            Err(ReduceError::IndexGap {
                expected: 1,
                found: 2
            })
        );
        // 回退同样非法.
        assert_eq!(
            reducer.push(background().view(), 0),
            Err(ReduceError::IndexGap {
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn test_stream_overrun_is_detected() {
        let bounds = CaseIndices::from_case_lens([1]);
        let mut reducer = RoiReducer::new(bounds);

        reducer.push(background().view(), 0).unwrap();
        assert_eq!(
            reducer.push(background().view(), 1),
            Err(ReduceError::StreamOverrun { index: 1 })
        );
    }

    #[test]
    fn test_truncated_stream_is_detected() {
        let bounds = CaseIndices::from_case_lens([3]);
        let mut reducer = RoiReducer::new(bounds);

        reducer.push(background().view(), 0).unwrap();
        assert_eq!(
            reducer.finish(),
            Err(ReduceError::TruncatedStream {
                case: 0,
                expected: 3,
                received: 1
            })
        );
    }

    #[test]
    fn test_running_box_is_observable() {
        let bounds = CaseIndices::from_case_lens([2]);
        let mut reducer = RoiReducer::new(bounds);

        assert!(reducer.current().is_empty());
        reducer.push(mask_with_rect(3, 3, 2, 2).view(), 0).unwrap();
        assert_eq!(reducer.current().min_x, 3);
    }
}

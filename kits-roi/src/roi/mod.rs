//! 逐 case 3D 包围盒 (粗 ROI) 的数据模型与流式归约.
//!
//! 坐标约定与 `roi.json` 文件格式一致: `x`/`y` 为切片平面内像素坐标
//! (`x` 沿宽度方向, `y` 沿高度方向), `z` 为 case 内切片索引.
//! `max_x`/`max_y` 是开区间右边界 (`rect.x + rect.width` 式语义),
//! `max_z` 是闭区间上界.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::consts::gray::is_foreground;
use crate::consts::{ROI_MAX_SENTINEL, ROI_MIN_SENTINEL};

mod reducer;
mod store;
mod vis;

pub use reducer::{BoundaryTableError, CaseIndices, CaseRoi, ReduceError, RoiReducer};
pub use store::{FlushError, RoiStore};
pub use vis::save_mask_with_roi;

/// 切片平面内前景像素的最小轴对齐包围矩形.
///
/// `x + width` 与 `y + height` 为开区间右/下边界.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoundRect {
    /// 左上角宽度方向坐标.
    pub x: usize,

    /// 左上角高度方向坐标.
    pub y: usize,

    /// 宽度方向像素数.
    pub width: usize,

    /// 高度方向像素数.
    pub height: usize,
}

/// 计算二维标签切片上所有前景像素的最小轴对齐包围矩形.
///
/// `mask` 按 (高, 宽) 排布, 背景像素值为
/// [`KITS_BACKGROUND`](crate::consts::gray::KITS_BACKGROUND).
/// 全背景切片返回 `None`.
pub fn bound_rect(mask: ArrayView2<'_, u8>) -> Option<BoundRect> {
    let mut min_h = usize::MAX;
    let mut max_h = usize::MIN;
    let mut min_w = usize::MAX;
    let mut max_w = usize::MIN;

    for ((h, w), &pix) in mask.indexed_iter() {
        if !is_foreground(pix) {
            continue;
        }
        min_h = min_h.min(h);
        max_h = max_h.max(h);
        min_w = min_w.min(w);
        max_w = max_w.max(w);
    }

    if min_h > max_h {
        return None;
    }
    Some(BoundRect {
        x: min_w,
        y: min_h,
        width: max_w - min_w + 1,
        height: max_h - min_h + 1,
    })
}

/// 单个 case 的 3D 包围盒 (粗 ROI).
///
/// 字段声明顺序即 `roi.json` 中的序列化顺序, 不要调整.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// 宽度方向下界 (含).
    pub min_x: i64,

    /// 高度方向下界 (含).
    pub min_y: i64,

    /// case 内切片索引下界 (含).
    pub min_z: i64,

    /// 宽度方向上界 (不含).
    pub max_x: i64,

    /// 高度方向上界 (不含).
    pub max_y: i64,

    /// case 内切片索引上界 (含).
    pub max_z: i64,
}

impl Roi {
    /// 构建哨兵初值包围盒: 所有 `min_*` 为 10000, 所有 `max_*` 为 -1.
    ///
    /// 全背景 case 的包围盒保持该初值不变, 并按原样写入输出文件.
    #[inline]
    pub const fn empty() -> Self {
        Self {
            min_x: ROI_MIN_SENTINEL,
            min_y: ROI_MIN_SENTINEL,
            min_z: ROI_MIN_SENTINEL,
            max_x: ROI_MAX_SENTINEL,
            max_y: ROI_MAX_SENTINEL,
            max_z: ROI_MAX_SENTINEL,
        }
    }

    /// 包围盒是否从未吸收过任何前景像素?
    ///
    /// 下游应通过该方法判断 "未检出", 而不是比较哨兵魔数.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.max_z < self.min_z
    }

    /// 用一个切片的平面内包围矩形扩张包围盒. `z` 为该切片的 case 内索引.
    ///
    /// 扩张是单调的: 任何分量都只会向外移动, 不会收缩.
    pub fn absorb(&mut self, rect: &BoundRect, z: usize) {
        let z = z as i64;
        self.min_x = self.min_x.min(rect.x as i64);
        self.min_y = self.min_y.min(rect.y as i64);
        self.min_z = self.min_z.min(z);
        self.max_x = self.max_x.max((rect.x + rect.width) as i64);
        self.max_y = self.max_y.max((rect.y + rect.height) as i64);
        self.max_z = self.max_z.max(z);
    }
}

impl Default for Roi {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

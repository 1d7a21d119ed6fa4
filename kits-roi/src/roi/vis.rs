//! 诊断用可视化侧通道.
//!
//! 只产生图片文件, 不影响任何持久化结果; 重实现时可整体省略.

use std::path::Path;

use image::{GrayImage, ImageResult, Luma};
use ndarray::ArrayView2;

use super::Roi;
use crate::consts::gray::*;

/// 使像素更有利于单通道可视化.
#[inline]
fn pretty(label: u8) -> u8 {
    match label {
        // 背景为黑色
        KITS_BACKGROUND => BLACK,

        // 肾脏为白色
        KITS_KIDNEY => WHITE,

        // 让肿瘤颜色更接近肾脏颜色
        KITS_TUMOR => LIGHT_GRAY,

        any_else => panic!("只允许图像存在 0, 1, 2 像素, 但发现了 `{any_else}`"),
    }
}

/// 把预测 mask 连同当前运行中的包围盒画成灰度 PNG, 保存到 `path`.
///
/// 包围盒只取平面内分量 (`x`/`y`), 边框以灰色描出并裁剪到图像范围内;
/// 哨兵初值 (尚无前景) 的包围盒不画.
pub fn save_mask_with_roi<P: AsRef<Path>>(
    mask: ArrayView2<'_, u8>,
    roi: &Roi,
    path: P,
) -> ImageResult<()> {
    let (height, width) = mask.dim();
    let mut buf = GrayImage::new(width as u32, height as u32);
    for ((h, w), &pix) in mask.indexed_iter() {
        buf.put_pixel(w as u32, h as u32, Luma([pretty(pix)]));
    }

    if !roi.is_empty() {
        let x0 = roi.min_x.clamp(0, width as i64 - 1) as u32;
        let y0 = roi.min_y.clamp(0, height as i64 - 1) as u32;
        // max_x/max_y 是开边界.
        let x1 = (roi.max_x - 1).clamp(0, width as i64 - 1) as u32;
        let y1 = (roi.max_y - 1).clamp(0, height as i64 - 1) as u32;

        for x in x0..=x1 {
            buf.put_pixel(x, y0, Luma([GRAY]));
            buf.put_pixel(x, y1, Luma([GRAY]));
        }
        for y in y0..=y1 {
            buf.put_pixel(x0, y, Luma([GRAY]));
            buf.put_pixel(x1, y, Luma([GRAY]));
        }
    }

    buf.save(path)
}

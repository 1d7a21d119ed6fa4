//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 原 KiTS19 数据集中, 背景的像素值.
    pub const KITS_BACKGROUND: u8 = 0;

    /// 原 KiTS19 数据集中, 肾脏的像素值.
    pub const KITS_KIDNEY: u8 = 1;

    /// 原 KiTS19 数据集中, 肿瘤的像素值.
    pub const KITS_TUMOR: u8 = 2;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道灰色.
    pub const GRAY: u8 = 0b_1000_0000;

    /// 单通道亮灰色.
    pub const LIGHT_GRAY: u8 = 0b_1100_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, KITS_BACKGROUND)
    }

    /// 像素是否是前景 (肾脏或肿瘤)?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }

    /// 像素是否是肾脏?
    #[inline]
    pub const fn is_kidney(p: u8) -> bool {
        matches!(p, KITS_KIDNEY)
    }

    /// 像素是否是肿瘤?
    #[inline]
    pub const fn is_tumor(p: u8) -> bool {
        matches!(p, KITS_TUMOR)
    }
}

/// KiTS19 训练集大小.
pub const KITS_TRAINING_SET_LEN: u32 = 210;

/// KiTS19 测试集大小.
pub const KITS_TESTING_SET_LEN: u32 = 90;

/// 网络输出类别数到标签值的映射表: 背景, 肾脏, 肿瘤 -> 背景, 肾脏, 肾脏.
///
/// 粗定位阶段不区分肾脏与肿瘤, 两类统一折叠为肾脏前景.
pub const SPEC_CLASSES: [u8; 3] = [0, 1, 1];

/// roi 文件中肾脏 ROI 所在的 organ 键名.
pub const ORGAN_KIDNEY: &str = "kidney";

/// 包围盒 `min_*` 分量的初始哨兵值. 比任何真实坐标都大.
///
/// 该值会按原样出现在全背景 case 的输出文件中, 不要随意改动,
/// 否则破坏 `roi.json` 的字节兼容性.
pub const ROI_MIN_SENTINEL: i64 = 10_000;

/// 包围盒 `max_*` 分量的初始哨兵值. 比任何真实坐标都小.
///
/// 同 [`ROI_MIN_SENTINEL`], 输出文件按原样保留.
pub const ROI_MAX_SENTINEL: i64 = -1;

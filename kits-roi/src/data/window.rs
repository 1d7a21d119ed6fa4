/// CT 窗口, 包含窗位 (window level) 和窗宽 (window width).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug)]
pub struct CtWindow {
    level: f32,
    width: f32,
}

impl CtWindow {
    /// 构建 CT 窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<CtWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 构建一个适合腹部软组织 (含肾脏) 的 CT 窗口. 该窗口的窗位为
    /// 50, 窗宽为 400.
    #[inline]
    pub const fn from_abdomen_visual() -> CtWindow {
        Self {
            level: 50.0,
            width: 400.0,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的 `[0, 1]` 规范化值.
    ///
    /// 该形式适合作为神经网络的输入. 无意义输入 (如 inf, NaN) 一律映射为 0.
    pub fn normalize(&self, ct: f32) -> f32 {
        if !ct.is_finite() {
            return 0.0;
        }
        let lb = self.lower_bound();
        if ct <= lb {
            0.0
        } else if ct >= self.upper_bound() {
            1.0
        } else {
            (ct - lb) / self.width()
        }
    }

    /// 求在当前 CT 窗设置下, `ct` HU 值对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `ct` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, ct: f32) -> Option<u8> {
        if !ct.is_finite() {
            return None;
        }
        // 255, not 256.
        Some((self.normalize(ct) * 255.0) as u8)
    }
}

//! 展平的全局索引切片流.
//!
//! 提供迭代器风格的数据集获取模式: 按给定顺序逐 case 打开 CT 扫描,
//! 把所有水平切片接成一条全局索引从 0 开始稠密递增的流.
//! 任意时刻内存中最多保留一个 case 的体素数据.

use ndarray::{Array3, Axis};

use super::imaging_path;
use crate::{CtVolume, CtWindow, OpenVolumeError};
use std::path::{Path, PathBuf};

/// 流中的一个元素: 单张切片及其邻域通道.
#[derive(Debug, Clone)]
pub struct SliceStack {
    /// 形如 (stack, H, W) 的网络输入数据, 已窗口规范化到 `[0, 1]`.
    /// 中心通道即切片本身, 其余通道为上下相邻切片 (case 边缘处夹取).
    pub data: Array3<f32>,

    /// 切片在展平流中的全局索引.
    pub global_index: usize,
}

/// 展平切片流.
///
/// 迭代产出 `Result<SliceStack, OpenVolumeError>`; 打开某个 case
/// 失败时产出一次 `Err`, 之后流终止 (该错误对批处理作业是致命的).
pub struct SliceStream {
    root: PathBuf,

    /// 尚未处理的 case 序号, 逆序存放便于 `pop`.
    cases_rev: Vec<u32>,

    stack_num: usize,
    window: CtWindow,

    /// 当前 case 的规范化体素数据.
    current: Option<Array3<f32>>,

    /// 当前 case 内的切片下标.
    in_case: usize,

    /// 下一个产出的全局索引.
    global: usize,

    poisoned: bool,
}

impl SliceStream {
    /// 从数据根目录和 case 列表创建切片流.
    ///
    /// `stack_num` 为邻域通道数, 必须是正奇数 (与原网络的输入通道
    /// 约定一致), 否则 panic. `cases` 的顺序即流中的 case 顺序.
    pub fn new<P: AsRef<Path>>(
        root: P,
        cases: Vec<u32>,
        stack_num: usize,
        window: CtWindow,
    ) -> Self {
        assert!(
            stack_num % 2 == 1,
            "stack_num 必须是正奇数, 实际为 {stack_num}"
        );
        let mut cases_rev = cases;
        cases_rev.reverse();

        Self {
            root: root.as_ref().to_owned(),
            cases_rev,
            stack_num,
            window,
            current: None,
            in_case: 0,
            global: 0,
            poisoned: false,
        }
    }

    /// 网络输入通道数.
    #[inline]
    pub fn stack_num(&self) -> usize {
        self.stack_num
    }

    /// 为当前 case 的第 `i` 张切片组装邻域通道.
    fn stack_at(&self, volume: &Array3<f32>, i: usize) -> Array3<f32> {
        let len_z = volume.len_of(Axis(0));
        let half = self.stack_num / 2;

        let views: Vec<_> = (0..self.stack_num)
            .map(|k| {
                // case 边缘处把越界邻居夹取到首/末切片.
                let z = (i + k).saturating_sub(half).min(len_z - 1);
                volume.index_axis(Axis(0), z)
            })
            .collect();

        // 所有视图同形, stack 不会失败.
        ndarray::stack(Axis(0), &views).unwrap()
    }
}

impl Iterator for SliceStream {
    type Item = Result<SliceStack, OpenVolumeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.poisoned {
            return None;
        }

        // 当前 case 耗尽 (或尚未开始) 时装载下一个 case.
        while self.current.is_none() {
            let case = self.cases_rev.pop()?;
            let volume = match CtVolume::open(imaging_path(&self.root, case as usize)) {
                Ok(v) => v,
                Err(e) => {
                    self.poisoned = true;
                    return Some(Err(e));
                }
            };
            if volume.len_z() == 0 {
                // 空体积: 不产出切片, 直接尝试下一个 case.
                continue;
            }
            self.current = Some(volume.into_normalized(&self.window));
            self.in_case = 0;
        }

        let volume = self.current.as_ref().unwrap();
        let len_z = volume.len_of(Axis(0));
        let data = self.stack_at(volume, self.in_case);
        let item = SliceStack {
            data,
            global_index: self.global,
        };

        self.in_case += 1;
        self.global += 1;
        if self.in_case >= len_z {
            self.current = None;
        }

        Some(Ok(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 绕开文件系统, 直接对私有的通道组装逻辑做检查.
    fn stream_for_stacking(stack_num: usize) -> SliceStream {
        SliceStream::new("data", vec![], stack_num, CtWindow::from_abdomen_visual())
    }

    /// 每张切片用常数值填充, 便于断言通道来源.
    fn marked_volume(len_z: usize) -> Array3<f32> {
        let mut v = Array3::zeros((len_z, 2, 2));
        for z in 0..len_z {
            v.index_axis_mut(Axis(0), z).fill(z as f32);
        }
        v
    }

    #[test]
    #[should_panic(expected = "stack_num 必须是正奇数")]
    fn test_even_stack_num_rejected() {
        stream_for_stacking(4);
    }

    #[test]
    fn test_stack_center_and_neighbours() {
        let s = stream_for_stacking(5);
        let volume = marked_volume(10);

        let stacked = s.stack_at(&volume, 5);
        assert_eq!(stacked.dim(), (5, 2, 2));
        let channels: Vec<f32> = (0..5).map(|c| stacked[(c, 0, 0)]).collect();
        assert_eq!(channels, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_stack_clamps_at_case_edges() {
        let s = stream_for_stacking(5);
        let volume = marked_volume(4);

        let head: Vec<f32> = {
            let st = s.stack_at(&volume, 0);
            (0..5).map(|c| st[(c, 0, 0)]).collect()
        };
        assert_eq!(head, vec![0.0, 0.0, 0.0, 1.0, 2.0]);

        let tail: Vec<f32> = {
            let st = s.stack_at(&volume, 3);
            (0..5).map(|c| st[(c, 0, 0)]).collect()
        };
        assert_eq!(tail, vec![1.0, 2.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn test_exhausted_case_list_ends_stream() {
        let mut s = stream_for_stacking(1);
        assert!(s.next().is_none());
    }
}

use std::fmt;
use std::path::Path;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx2d, Idx3d};

mod window;

pub use window::CtWindow;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 打开 3D CT 扫描文件错误.
#[derive(Debug)]
pub enum OpenVolumeError {
    /// 底层 nifti 读取/解码错误.
    Nifti(nifti::NiftiError),

    /// 数据不是三维体素 (参数为实际维数).
    BadRank(usize),
}

impl fmt::Display for OpenVolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nifti(e) => write!(f, "nifti error: {e}"),
            Self::BadRank(n) => write!(f, "expected 3-dimensional volume, found {n}-dimensional"),
        }
    }
}

impl std::error::Error for OpenVolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Nifti(e) => Some(e),
            Self::BadRank(_) => None,
        }
    }
}

impl From<nifti::NiftiError> for OpenVolumeError {
    fn from(e: nifti::NiftiError) -> Self {
        Self::Nifti(e)
    }
}

/// 只读 header, 获取文件的水平切片个数.
///
/// 构建 case 边界表只需要每个 case 的切片数, 没必要解码体素数据.
pub fn slice_count<P: AsRef<Path>>(path: P) -> Result<usize, OpenVolumeError> {
    let header = NiftiHeader::from_file(path.as_ref())?;
    if header.dim[0] != 3 {
        return Err(OpenVolumeError::BadRank(header.dim[0] as usize));
    }
    // KiTS19 的体素天然按 (z, H, W) 排布, 第一维即切片数.
    Ok(header.dim[1] as usize)
}

/// nii 格式 3D CT 扫描, 包括 header 和 CT 扫描 (HU). HU 值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct CtVolume {
    header: BoxedHeader,
    data: Array3<f32>,
}

impl CtVolume {
    /// 打开 nii (或 nii.gz) 文件格式的 3D CT 扫描. `path` 为文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenVolumeError> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // KiTS19 与 LiTS 不同, 体素顺序天然就是 (z, H, W), 无需轴置换;
        // 只需把 fortran 序转成行主序, 以便后续按切片高效迭代.
        let data = obj.into_volume().into_ndarray::<f32>()?;
        if data.ndim() != 3 {
            return Err(OpenVolumeError::BadRank(data.ndim()));
        }

        // 维数已检查, 该转换不会失败.
        let data = data
            .as_standard_layout()
            .into_owned()
            .into_dimensionality::<Ix3>()
            .unwrap();

        Ok(Self { header, data })
    }

    /// 获取 header 部分.
    #[inline]
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// 获取数据形状大小, 按 (z, H, W) 排布.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let &[z, h, w] = self.data.shape() else {
            unreachable!("CtVolume 数据总是三维的");
        };
        (z, h, w)
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代 3D 扫描水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, f32>> {
        self.data.axis_iter(Axis(0))
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 用给定 CT 窗口把整个体素数组规范化到 `[0, 1]`, 消耗 `self`.
    ///
    /// 规范化后的数组可直接作为分割网络的输入通道.
    pub fn into_normalized(self, window: &CtWindow) -> Array3<f32> {
        let mut data = self.data;
        data.mapv_inplace(|hu| window.normalize(hu));
        data
    }
}

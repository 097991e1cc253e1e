use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView, ArrayViewMut, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::binary::*;
use crate::{Idx3d, StencilError, StencilResult};

pub mod save;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// 判定两个体素分辨率相同时的相对容差.
///
/// 同一病人的不同文件往往由不同工具导出, `f32` 的 pixdim 会有末位差异.
const SPACING_RTOL: f64 = 1e-4;

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 从 header 获取 `[z, H, W]` 顺序的体素分辨率, 以毫米为单位.
#[inline]
fn get_spacing_from_header(h: &NiftiHeader) -> [f64; 3] {
    let [_, w, h, z, ..] = h.pixdim;
    [z.abs() as f64, h.abs() as f64, w.abs() as f64]
}

/// 体数据的网格: 形状与体素分辨率.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Grid {
    /// `(z, H, W)` 形状.
    pub shape: Idx3d,

    /// `[z, H, W]` 体素分辨率, 以毫米为单位.
    pub spacing: [f64; 3],
}

impl Grid {
    /// 从 nifti header 中读取网格.
    pub fn from_header(header: &NiftiHeader) -> Self {
        Self {
            shape: get_shape_from_header(header),
            spacing: get_spacing_from_header(header),
        }
    }

    /// 形状相同, 且体素分辨率在容差内相同.
    pub fn matches(&self, other: &Grid) -> bool {
        self.shape == other.shape
            && self
                .spacing
                .iter()
                .zip(other.spacing.iter())
                .all(|(a, b)| (a - b).abs() <= SPACING_RTOL * a.abs().max(b.abs()))
    }

    /// 若与 `other` 不一致则返回 [`StencilError::GridMismatch`].
    pub fn ensure_matches(&self, other: &Grid) -> StencilResult<()> {
        if self.matches(other) {
            Ok(())
        } else {
            Err(StencilError::GridMismatch {
                expected: *self,
                found: *other,
            })
        }
    }
}

impl Display for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (z, h, w) = self.shape;
        let [sz, sh, sw] = self.spacing;
        write!(f, "{z}x{h}x{w} @ {sz:.4}x{sh:.4}x{sw:.4} mm")
    }
}

/// 3D nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    #[inline]
    fn spacing(&self) -> [f64; 3] {
        get_spacing_from_header(self.header())
    }

    /// 获取 width 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn width_mm(&self) -> f64 {
        self.spacing()[2]
    }

    /// 获取 height 方向体素分辨率, 以毫米为单位.
    #[inline]
    fn height_mm(&self) -> f64 {
        self.spacing()[1]
    }

    /// 获取空间方向 (相邻 2D 切片的方向) 体素分辨率, 以毫米为单位.
    #[inline]
    fn z_mm(&self) -> f64 {
        self.spacing()[0]
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.spacing().iter().product()
    }
}

impl NiftiHeaderAttr for NiftiHeader {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        self
    }
}

/// nii 格式 3D 体数据, 包括 header 和按 `(z, H, W)` 存储的体素.
///
/// header 仅用于提供体素分辨率和坐标系信息; 形状总是以 `data` 为准.
#[derive(Debug, Clone)]
pub struct Volume<T> {
    header: BoxedHeader,
    data: Array3<T>,
}

/// 二值掩膜. 体素值仅为 0 或 1.
pub type BinaryMask = Volume<u8>;

/// 多值血管标签. 非零值各代表一个解剖结构.
pub type LabelVolume = Volume<u16>;

/// 有符号距离场, 以毫米为单位. 内部为负, 外部为正.
pub type DistanceField = Volume<f64>;

impl<T> NiftiHeaderAttr for Volume<T> {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

macro_rules! impl_open {
    ($($elem: ty),+) => {
        $(
            impl Volume<$elem> {
                /// 打开 nii 文件格式的 3D 体数据. `path` 为 nii 文件的本地路径.
                /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
                pub fn open<P: AsRef<Path>>(path: P) -> StencilResult<Self> {
                    let path = path.as_ref();
                    let obj = ReaderOptions::new()
                        .read_file(path)
                        .map_err(StencilError::nifti(path))?;
                    let header = Box::new(obj.header().clone());

                    // [W, H, z] -> [z, H, W].
                    let data = obj
                        .into_volume()
                        .into_ndarray::<$elem>()
                        .map_err(StencilError::nifti(path))?
                        .into_dimensionality::<Ix3>()?
                        .permuted_axes([2, 1, 0]);
                    let data = if data.is_standard_layout() {
                        data
                    } else {
                        data.as_standard_layout().into_owned()
                    };

                    Ok(Self { header, data })
                }
            }
        )+
    };
}

impl_open!(u8, u16, f32);

impl<T> Volume<T> {
    /// 根据裸数据和体素分辨率直接创建体数据.
    ///
    /// `data` 按 `(z, H, W)` 组织, `spacing` 按 `[z, H, W]` 给出, 以毫米为单位.
    ///
    /// nifti-1 header 以 `f32` 保存分辨率, 因此读回的分辨率会有 `f32` 精度的误差,
    /// 例如 `0.8` 读回为 `0.800000011920929`.
    ///
    /// # Panics
    ///
    /// 任一维度超过 `u16::MAX` (nifti-1 header 的上限) 时 panic.
    pub fn from_raw(data: Array3<T>, spacing: [f64; 3]) -> Self {
        let (z, h, w) = data.dim();
        assert!(
            z.max(h).max(w) <= u16::MAX as usize,
            "体数据形状 {:?} 超出 nifti-1 header 的上限",
            (z, h, w)
        );

        let mut header = Box::<NiftiHeader>::default();
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [sz, sh, sw] = spacing;
        header.pixdim = [1.0, sw as f32, sh as f32, sz as f32, 1.0, 1.0, 1.0, 1.0];
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;

        Self { header, data }
    }

    /// 以 `reference` 的 header (体素分辨率、坐标系) 包装新数据.
    ///
    /// `data` 的形状必须与 `reference` 一致, 否则 panic.
    pub fn like<U>(reference: &Volume<U>, data: Array3<T>) -> Self {
        assert_eq!(reference.shape(), data.dim(), "数据形状与参考体数据不一致");
        Self {
            header: reference.header.clone(),
            data,
        }
    }

    /// 获取数据形状 `(z, H, W)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 获取数据体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 获取网格 (形状 + 体素分辨率).
    #[inline]
    pub fn grid(&self) -> Grid {
        Grid {
            shape: self.shape(),
            spacing: self.spacing(),
        }
    }

    /// 若与 `other` 网格不一致则返回 [`StencilError::GridMismatch`].
    #[inline]
    pub fn ensure_same_grid<U>(&self, other: &Volume<U>) -> StencilResult<()> {
        self.grid().ensure_matches(&other.grid())
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, T, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, T, Ix3> {
        self.data.view_mut()
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// 逐体素映射, 保留 header.
    pub fn map<U, F>(&self, f: F) -> Volume<U>
    where
        F: FnMut(&T) -> U,
    {
        Volume {
            header: self.header.clone(),
            data: self.data.map(f),
        }
    }
}

impl<T: PartialEq> Volume<T> {
    /// 获取值为 `value` 的体素个数.
    #[inline]
    pub fn count(&self, value: T) -> usize {
        self.data.iter().filter(|p| **p == value).count()
    }
}

impl LabelVolume {
    /// 二值化: 非零标签为前景.
    pub fn to_binary(&self) -> BinaryMask {
        self.map(|&p| if p != 0 { FOREGROUND } else { BACKGROUND })
    }
}

impl BinaryMask {
    /// 获取前景体素个数.
    #[inline]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 是否不存在前景.
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().all(|p| is_background(*p))
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| is_foreground(*p).then_some(pos))
            .collect()
    }

    /// `self` 的前景是否是 `other` 前景的子集.
    ///
    /// 网格不一致时 panic.
    pub fn is_subset_of(&self, other: &BinaryMask) -> bool {
        assert_eq!(self.shape(), other.shape());
        self.data
            .iter()
            .zip(other.data.iter())
            .all(|(a, b)| is_background(*a) || is_foreground(*b))
    }

    /// 两个掩膜前景的交集体素个数.
    ///
    /// 网格不一致时 panic.
    pub fn overlap(&self, other: &BinaryMask) -> usize {
        assert_eq!(self.shape(), other.shape());
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|(a, b)| is_foreground(**a) && is_foreground(**b))
            .count()
    }
}

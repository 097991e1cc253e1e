//! 体数据的持久化存储.

use super::Volume;
use crate::{StencilError, StencilResult};
use nifti::writer::WriterOptions;
use std::fs;
use std::path::{Path, PathBuf};

/// 表明一个可以按原样保存为 nifti 文件的体数据对象.
///
/// 文件名以 `.gz` 结尾时以 gzip 压缩保存. 目标文件已存在时直接覆盖.
pub trait NiftiWrite {
    /// 按原样将体数据保存到 `path` 路径. `path` 的父目录必须已经存在.
    fn save<P: AsRef<Path>>(&self, path: P) -> StencilResult<()>;
}

macro_rules! impl_nifti_write {
    ($($elem: ty),+) => {
        $(
            impl NiftiWrite for Volume<$elem> {
                fn save<P: AsRef<Path>>(&self, path: P) -> StencilResult<()> {
                    let path = path.as_ref();
                    let mut header = self.header.as_ref().clone();
                    // 保存的是原始体素值, 不能再被读取方缩放.
                    header.scl_slope = 1.0;
                    header.scl_inter = 0.0;

                    // [z, H, W] -> [W, H, z]
                    let data = self.data.view().permuted_axes([2, 1, 0]);
                    WriterOptions::new(path)
                        .reference_header(&header)
                        .write_nifti(&data)
                        .map_err(StencilError::nifti(path))
                }
            }
        )+
    };
}

impl_nifti_write!(u8, u16, f32, f64);

/// 将 `volume` 以文件名 `filename` 保存到目录 `dir` 下, 返回完整路径.
///
/// `dir` (及其父目录) 不存在时会被创建. 多个线程同时创建同一目录是安全的.
/// 重复写入同一路径会直接覆盖, 不会报错.
pub fn write_mask<V, P>(volume: &V, dir: P, filename: &str) -> StencilResult<PathBuf>
where
    V: NiftiWrite,
    P: AsRef<Path>,
{
    let dir = dir.as_ref();
    // `create_dir_all` 在目录已存在 (包括被其它线程抢先创建) 时返回 `Ok`.
    fs::create_dir_all(dir).map_err(StencilError::io(dir))?;
    let path = dir.join(filename);
    volume.save(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::write_mask;
    use crate::consts::binary::FOREGROUND;
    use crate::{BinaryMask, LabelVolume, NiftiHeaderAttr};
    use ndarray::Array3;

    fn sample_mask() -> BinaryMask {
        let mut mask = BinaryMask::from_raw(Array3::zeros((3, 4, 5)), [2.0, 0.5, 0.75]);
        mask[(0, 0, 0)] = FOREGROUND;
        mask[(1, 2, 3)] = FOREGROUND;
        mask[(2, 3, 4)] = FOREGROUND;
        mask
    }

    #[test]
    fn test_write_creates_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        let path = write_mask(&sample_mask(), &dir, "mask.nii").unwrap();
        assert_eq!(path, dir.join("mask.nii"));
        assert!(path.is_file());
    }

    #[test]
    fn test_write_round_trip_keeps_geometry() {
        let tmp = tempfile::tempdir().unwrap();
        let mask = sample_mask();
        for name in ["mask.nii", "mask.nii.gz"] {
            let path = write_mask(&mask, tmp.path(), name).unwrap();
            let back = BinaryMask::open(&path).unwrap();
            assert_eq!(back.shape(), mask.shape());
            assert_eq!(back.data(), mask.data());
            for (a, b) in back.spacing().iter().zip(mask.spacing().iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    /// 重复写入同一路径: 不报错, 内容不变.
    #[test]
    fn test_write_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mask = sample_mask();
        let first = write_mask(&mask, tmp.path(), "mask_full_2.nii").unwrap();
        let bytes = std::fs::read(&first).unwrap();
        let second = write_mask(&mask, tmp.path(), "mask_full_2.nii").unwrap();
        assert_eq!(first, second);
        assert_eq!(bytes, std::fs::read(&second).unwrap());
    }

    #[test]
    fn test_binary_mask_reads_as_label() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_mask(&sample_mask(), tmp.path(), "mask.nii").unwrap();
        let label = LabelVolume::open(path).unwrap();
        assert_eq!(label.count(1), 3);
    }
}

//! 运行时错误.

use crate::data::Grid;
use std::path::PathBuf;
use thiserror::Error;

/// 掩膜生成流程的统一结果类型.
pub type StencilResult<T> = Result<T, StencilError>;

/// 掩膜生成流程的运行时错误.
///
/// 前置条件错误和 I/O 错误只会中止所在的任务单元 (或病人组装),
/// 不会影响同一病人的其它任务单元.
#[derive(Debug, Error)]
pub enum StencilError {
    /// nifti 文件读写失败.
    #[error("nifti I/O failed on `{path}`")]
    Nifti {
        /// 出错文件.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: nifti::NiftiError,
    },

    /// 其他底层 I/O 错误 (目录创建、目录遍历等).
    #[error("I/O failed on `{path}`")]
    Io {
        /// 出错路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: std::io::Error,
    },

    /// 体数据不是三维的.
    #[error("volume is not 3-dimensional: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// 参与同一计算的体数据网格不一致.
    #[error("grid mismatch: expected {expected}, found {found}")]
    GridMismatch {
        /// 基准网格.
        expected: Grid,
        /// 实际网格.
        found: Grid,
    },

    /// 病人没有对应的 CT 文件.
    #[error("no CT file named `{patient}.<ext>` for patient `{patient}`")]
    MissingCt {
        /// 病人 ID.
        patient: String,
    },

    /// 病人有多个候选 CT 文件.
    #[error("patient `{patient}` has {count} candidate CT files")]
    AmbiguousCt {
        /// 病人 ID.
        patient: String,
        /// 候选个数.
        count: usize,
    },

    /// 同一病人的两个血管标签文件得到了相同的掩膜键.
    #[error("patient `{patient}` has more than one mask keyed `{key}`")]
    DuplicateMaskKey {
        /// 病人 ID.
        patient: String,
        /// 重复的键.
        key: String,
    },

    /// 移除掩膜不存在.
    #[error("removal mask `{key}` not present for patient `{patient}`")]
    MissingRemovalMask {
        /// 病人 ID.
        patient: String,
        /// 移除掩膜键.
        key: String,
    },

    /// 标签中不同的非零值个数超出角色表长度.
    #[error("found {found} distinct labels but only {roles} role names were supplied")]
    TooManyLabels {
        /// 非零标签值个数.
        found: usize,
        /// 角色表长度.
        roles: usize,
    },

    /// 距离值无意义 (NaN).
    #[error("invalid shell distance `{0}`")]
    InvalidDistance(f64),

    /// 任务单元 panic.
    #[error("worker panicked: {0}")]
    UnitPanicked(String),

    /// 配置或 manifest 格式错误.
    #[cfg(feature = "serde")]
    #[error("malformed configuration or manifest")]
    Manifest(#[from] serde_json::Error),
}

impl StencilError {
    /// 以 `path` 包装 nifti 错误.
    #[inline]
    pub(crate) fn nifti(path: impl Into<PathBuf>) -> impl FnOnce(nifti::NiftiError) -> Self {
        let path = path.into();
        move |source| Self::Nifti { path, source }
    }

    /// 以 `path` 包装 I/O 错误.
    #[inline]
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

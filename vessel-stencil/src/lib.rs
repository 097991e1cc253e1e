#![warn(missing_docs)]

//! 核心库. 从 nifti 格式的血管标签生成血管周围空间 (perivascular shell) 掩膜.
//!
//! 每个病人有一个 CT 扫描和若干血管标签文件. 对每个 (血管掩膜, 距离) 组合,
//! 本库计算 "在血管外部、且距离血管边界不超过给定毫米数" 的体素集合,
//! 并从中剔除移除掩膜 (一般是全血管树), 然后保存到磁盘.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有参与同一计算的体数据必须具有相同的网格形状和体素分辨率,
//!   否则返回 [`StencilError::GridMismatch`], 不会静默处理.
//! 2. 体数据完整驻留内存, 不支持流式处理.
//!
//! # 开发计划
//!
//! ### 多值标签拆分 ✅
//!
//! 按标签值升序拆分为二值掩膜, 再按调用方提供的角色表命名
//! (默认 `vein`, `artery`).
//!
//! 实现位于 `vessel-stencil/src/label.rs`.
//!
//! ### 带体素分辨率的精确欧氏距离变换 ✅
//!
//! 可分离的下包络线算法, 三个方向依次处理. 打开 `rayon` feature 时按平面并行.
//!
//! 实现位于 `vessel-stencil/src/shell/edt.rs`.
//!
//! ### 血管周围空间与移除掩膜 ✅
//!
//! 实现位于 `vessel-stencil/src/shell`.
//!
//! ### 病人数据组装 ✅
//!
//! 支持两种来源: (1) 平铺目录下的文件名约定; (2) 显式 manifest.
//! 病人与文件的匹配要求病人 ID 之后紧跟分隔符, 因此 `P1` 不会误认 `P10_*` 的文件.
//!
//! 实现位于 `vessel-stencil/src/patient`.
//!
//! ### 有界线程池任务分发 ✅
//!
//! 每个 (掩膜, 距离) 组合是一个独立任务, 病人之间严格串行,
//! 病人内部以固定大小线程池并行, 并以 join 屏障收尾.
//!
//! 实现位于 `vessel-stencil/src/schedule`.
//!
//! ### 任务超时与取消 ⌛️
//!
//! 目前挂起的任务会使 join 屏障无限等待.

/// 三维索引, 按 `(z, h, w)` 顺序.
pub type Idx3d = (usize, usize, usize);

/// 3D nii 体数据基础结构.
mod data;

pub use data::save::{write_mask, NiftiWrite};
pub use data::{BinaryMask, DistanceField, Grid, LabelVolume, NiftiHeaderAttr, Volume};

mod error;

pub use error::{StencilError, StencilResult};

pub mod config;
pub mod consts;
pub mod label;
pub mod observe;
pub mod patient;
pub mod pipeline;
pub mod prelude;
pub mod schedule;
pub mod shell;

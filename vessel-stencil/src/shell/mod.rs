//! 血管周围空间 (perivascular shell) 的几何计算.
//!
//! 计算分三步:
//!
//! 1. 由血管掩膜计算有符号距离场: 内部为负, 外部为正, 单位为毫米 (非平方);
//! 2. 取距离落在开区间 `(0, radius)` 内的体素, 即血管外部、距血管不超过 `radius` 的区域;
//! 3. 减去二值化后的移除掩膜, 负值截断为 0, 再重新二值化.
//!
//! 第三步保证结果与移除掩膜不相交, 即使移除掩膜是比血管本身更大的结构
//! (如全血管树之于某一分支).

mod edt;

pub use edt::squared_distance;

use crate::consts::binary::*;
use crate::{BinaryMask, DistanceField, NiftiHeaderAttr, StencilError, StencilResult, Volume};
use ndarray::Zip;

/// 计算 `vessel` 的有符号距离场.
///
/// 外部体素的值为其到最近血管体素的距离; 内部体素的值为其到最近非血管体素距离的相反数.
/// 距离均考虑体素分辨率. 血管为空时所有体素均为 `+inf`.
pub fn signed_distance(vessel: &BinaryMask) -> DistanceField {
    let spacing = vessel.spacing();
    let outside = squared_distance(vessel.data(), spacing, |p| is_foreground(*p));
    let inside = squared_distance(vessel.data(), spacing, |p| is_background(*p));

    let data = Zip::from(vessel.data())
        .and(&outside)
        .and(&inside)
        .map_collect(|&p, &o, &i| {
            if is_foreground(p) {
                -i.sqrt()
            } else {
                o.sqrt()
            }
        });
    Volume::like(vessel, data)
}

/// 取距离严格落在开区间 `(lower, upper)` 内的体素为前景.
pub fn threshold_open(field: &DistanceField, lower: f64, upper: f64) -> BinaryMask {
    field.map(|&d| {
        if lower < d && d < upper {
            FOREGROUND
        } else {
            BACKGROUND
        }
    })
}

/// 从 `shell` 中剔除 `removal` 的前景.
///
/// `removal` 在其全部正值范围内被二值化. 差值为负的体素截断为背景.
/// 网格不一致时返回 [`StencilError::GridMismatch`].
pub fn remove_mask(shell: &BinaryMask, removal: &BinaryMask) -> StencilResult<BinaryMask> {
    shell.ensure_same_grid(removal)?;
    let data = Zip::from(shell.data())
        .and(removal.data())
        .map_collect(|&s, &r| {
            let diff = i16::from(s) - i16::from(is_foreground(r));
            if diff >= 1 {
                FOREGROUND
            } else {
                BACKGROUND
            }
        });
    Ok(Volume::like(shell, data))
}

/// 由血管掩膜 `vessel`, 距离 `radius` (毫米) 和移除掩膜 `removal` 计算血管周围空间.
///
/// # 返回值
///
/// - `radius <= 0` 或血管为空时, 得到全背景掩膜 (不报错);
/// - `radius` 为 NaN 时返回 [`StencilError::InvalidDistance`];
/// - `vessel` 与 `removal` 网格不一致时返回 [`StencilError::GridMismatch`].
pub fn compute_shell(
    vessel: &BinaryMask,
    radius: f64,
    removal: &BinaryMask,
) -> StencilResult<BinaryMask> {
    if radius.is_nan() {
        return Err(StencilError::InvalidDistance(radius));
    }
    vessel.ensure_same_grid(removal)?;

    let field = signed_distance(vessel);
    let shell = threshold_open(&field, 0.0, radius);
    remove_mask(&shell, removal)
}

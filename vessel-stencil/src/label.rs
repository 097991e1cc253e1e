//! 多值血管标签拆分.
//!
//! 一个血管标签文件中可能同时包含多种结构 (如静脉和动脉分别记为 1 和 2).
//! 拆分规则是纯粹的排序规则: 非零标签值升序排列, 第 `i` 个值对应角色表中的第 `i` 个角色.
//! 例如标签值为 0, 30, 40 时, 30 为静脉, 40 为动脉.

use crate::consts::binary::*;
use crate::consts::DEFAULT_ROLES;
use crate::{BinaryMask, LabelVolume, StencilError, StencilResult};
use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 获取标签中所有不同的非零值, 升序.
pub fn distinct_labels(mask: &LabelVolume) -> Vec<u16> {
    mask.data()
        .iter()
        .copied()
        .filter(|&p| p != 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 将多值标签拆分为二值掩膜, 每个不同的非零值一个, 按标签值升序排列.
///
/// 第 `i` 个掩膜恰在原标签等于第 `i` 小的非零值处为前景.
/// 全零标签返回空 `Vec`.
pub fn separate(mask: &LabelVolume) -> Vec<BinaryMask> {
    distinct_labels(mask)
        .into_iter()
        .map(|value| separate_one(mask, value))
        .collect()
}

/// 提取标签值等于 `value` 的二值掩膜.
#[inline]
fn separate_one(mask: &LabelVolume, value: u16) -> BinaryMask {
    mask.map(|&p| if p == value { FOREGROUND } else { BACKGROUND })
}

/// 角色表. 标签值升序的第 `i` 个结构被命名为第 `i` 个角色.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RoleTable {
    roles: Vec<String>,
}

impl Default for RoleTable {
    /// `["vein", "artery"]`.
    fn default() -> Self {
        Self::new(DEFAULT_ROLES)
    }
}

impl RoleTable {
    /// 由有序角色名构建.
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// 角色个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// 角色表是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// 第 `index` 个角色名.
    #[inline]
    pub fn role(&self, index: usize) -> Option<&str> {
        self.roles.get(index).map(String::as_str)
    }

    /// 按升序依次迭代角色名.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// 若 `found` 个结构无法全部命名, 则返回 [`StencilError::TooManyLabels`].
    pub fn check(&self, found: usize) -> StencilResult<()> {
        if found > self.len() {
            Err(StencilError::TooManyLabels {
                found,
                roles: self.len(),
            })
        } else {
            Ok(())
        }
    }

    /// 为 [`separate`] 的结果按顺序命名. 结构个数超出角色表长度时返回
    /// [`StencilError::TooManyLabels`].
    pub fn assign<T>(&self, parts: Vec<T>) -> StencilResult<Vec<(String, T)>> {
        self.check(parts.len())?;
        Ok(self.iter().map(str::to_owned).zip(parts).collect())
    }
}

/// 拆分标签并为每个结构命名. 返回 `(角色名, 掩膜)`, 按标签值升序.
///
/// 不同非零值的个数超出 `roles` 长度时返回 [`StencilError::TooManyLabels`],
/// 且不会生成任何掩膜.
pub fn separate_named(
    mask: &LabelVolume,
    roles: &RoleTable,
) -> StencilResult<Vec<(String, BinaryMask)>> {
    let values = distinct_labels(mask);
    roles.check(values.len())?;
    roles.assign(
        values
            .into_iter()
            .map(|value| separate_one(mask, value))
            .collect(),
    )
}

//! 文件名约定.
//!
//! 平铺目录下, 病人 `P` 的 CT 文件名为 `P.<ext>`, 血管标签文件名形如
//! `P_xxxx.<ext>`, 其中去掉扩展名后的最后 [`MASK_KEY_LEN`](crate::consts::MASK_KEY_LEN)
//! 个字符为掩膜键 (如 `full`).

use std::collections::BTreeSet;
use std::path::Path;

/// 获取体数据文件去掉扩展名后的文件名. `a.nii.gz` 与 `a.nii` 均得到 `a`.
pub fn volume_stem(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    let name = name.strip_suffix(".gz").unwrap_or(name);
    Some(name.rsplit_once('.').map_or(name, |(stem, _)| stem))
}

/// 文件名 `stem` 是否属于病人 `patient`.
///
/// 要求 `stem == patient`, 或者 `stem` 以 `patient` 开头且紧跟一个非字母数字的分隔符.
/// 因此 `P1` 不会匹配 `P10_full`.
pub fn belongs_to(stem: &str, patient: &str) -> bool {
    match stem.strip_prefix(patient) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

/// 取 `stem` 的最后 `len` 个字符作为掩膜键. `stem` 不足 `len` 个字符时返回整个 `stem`.
pub fn mask_key(stem: &str, len: usize) -> &str {
    if len == 0 {
        return "";
    }
    let start = stem.char_indices().rev().nth(len - 1).map_or(0, |(i, _)| i);
    &stem[start..]
}

/// 取 `stem` 的前 `len` 个字符. `stem` 不足 `len` 个字符时返回 `None`.
fn prefix(stem: &str, len: usize) -> Option<&str> {
    match stem.char_indices().nth(len) {
        Some((i, _)) => Some(&stem[..i]),
        None => (stem.chars().count() == len).then_some(stem),
    }
}

/// 由文件列表推断病人 ID: 所有文件名长度不小于 `id_len` 的前缀, 去重后升序.
pub fn patient_ids<P: AsRef<Path>>(files: &[P], id_len: usize) -> Vec<String> {
    files
        .iter()
        .filter_map(|f| volume_stem(f.as_ref()))
        .filter_map(|stem| prefix(stem, id_len))
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// 距离的文件名表示: 最短的可还原十进制形式, 如 `2`, `2.5`.
#[inline]
pub fn format_distance(distance: f64) -> String {
    format!("{distance}")
}

/// 输出掩膜文件名: `mask_<key>_<distance>.<ext>`.
pub fn shell_filename(key: &str, distance: f64, extension: &str) -> String {
    format!(
        "{}_{key}_{}.{extension}",
        crate::consts::MASK_PREFIX,
        format_distance(distance)
    )
}

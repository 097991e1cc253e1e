//! 流程配置.

use crate::consts::{DEFAULT_DISTANCES, DEFAULT_EXTENSION, DEFAULT_ID_LEN, FULL_KEY, MASK_KEY_LEN};
use crate::label::RoleTable;
use crate::{StencilError, StencilResult};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 获得可并行核心数.
pub fn available_workers() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 掩膜生成流程配置.
///
/// 所有字段都有默认值, 因此 JSON 配置文件只需给出需要修改的部分.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct PipelineConfig {
    /// 输入目录. 默认为 `$HOME/dataset/Vessel_stencils`.
    pub input_dir: PathBuf,

    /// 输出根目录. 每个病人一个子目录. 默认为 `$HOME/dataset/Vessel_stencils/masks`.
    pub output_root: PathBuf,

    /// 显式 manifest. 给出时不再扫描 `input_dir`.
    pub manifest: Option<PathBuf>,

    /// 距离 (毫米).
    pub distances: Vec<f64>,

    /// 线程池大小. 默认为可用核心数.
    pub workers: usize,

    /// 移除掩膜的键.
    pub removal_key: String,

    /// 默认角色表.
    pub roles: RoleTable,

    /// 文件名约定下病人 ID 的定长前缀长度.
    pub id_len: usize,

    /// 文件名约定下的掩膜键长度.
    pub key_len: usize,

    /// 输出扩展名.
    pub extension: String,

    /// 是否在当前线程串行运行任务单元.
    pub serial: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let input_dir = home_dataset_dir_with(["Vessel_stencils"])
            .unwrap_or_else(|| PathBuf::from("Vessel_stencils"));
        let output_root = input_dir.join("masks");
        Self {
            input_dir,
            output_root,
            manifest: None,
            distances: DEFAULT_DISTANCES.to_vec(),
            workers: available_workers(),
            removal_key: FULL_KEY.to_owned(),
            roles: RoleTable::default(),
            id_len: DEFAULT_ID_LEN,
            key_len: MASK_KEY_LEN,
            extension: DEFAULT_EXTENSION.to_owned(),
            serial: false,
        }
    }
}

impl PipelineConfig {
    /// 检查距离是否都有意义. NaN 返回 [`StencilError::InvalidDistance`].
    ///
    /// 非正距离是合法的, 只会得到全背景的掩膜.
    pub fn validate(&self) -> StencilResult<()> {
        match self.distances.iter().find(|d| d.is_nan()) {
            Some(&d) => Err(StencilError::InvalidDistance(d)),
            None => Ok(()),
        }
    }

    /// 从 JSON 字符串解析. 缺失的字段取默认值.
    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> StencilResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// 从 JSON 文件读取.
    #[cfg(feature = "serde")]
    pub fn open<P: AsRef<Path>>(path: P) -> StencilResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(StencilError::io(path))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = PipelineConfig::default();
        assert_eq!(c.distances, vec![2.0, 3.0, 5.0]);
        assert_eq!(c.removal_key, "full");
        assert_eq!(c.id_len, 24);
        assert_eq!(c.key_len, 4);
        assert_eq!(c.extension, "nii.gz");
        assert!(c.workers >= 1);
        assert!(c.output_root.starts_with(&c.input_dir));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let c = PipelineConfig {
            distances: vec![2.0, -1.0, f64::NAN],
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(StencilError::InvalidDistance(_))));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_partial_json() {
        let c = PipelineConfig::from_json_str(
            r#"{
                "input_dir": "/data/in",
                "distances": [1.5, 4],
                "roles": ["portal", "hepatic", "artery"],
                "serial": true
            }"#,
        )
        .unwrap();
        assert_eq!(c.input_dir, PathBuf::from("/data/in"));
        assert_eq!(c.distances, vec![1.5, 4.0]);
        assert_eq!(c.roles.len(), 3);
        assert_eq!(c.roles.role(0), Some("portal"));
        assert!(c.serial);
        assert_eq!(c.removal_key, "full");
        assert!(c.manifest.is_none());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_open() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        std::fs::write(&path, r#"{"workers": 3, "extension": "nii"}"#).unwrap();
        let c = PipelineConfig::open(&path).unwrap();
        assert_eq!(c.workers, 3);
        assert_eq!(c.extension, "nii");

        assert!(matches!(
            PipelineConfig::open(tmp.path().join("missing.json")),
            Err(StencilError::Io { .. })
        ));
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            PipelineConfig::open(&path),
            Err(StencilError::Manifest(_))
        ));
    }
}

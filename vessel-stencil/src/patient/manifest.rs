//! 显式 manifest.
//!
//! ```json
//! {
//!   "patients": [
//!     {
//!       "id": "P1",
//!       "ct": "/data/P1.nii.gz",
//!       "masks": [
//!         { "path": "/data/P1_full.nii.gz", "key": "full" },
//!         { "path": "/data/P1_pv.nii.gz", "key": "pv", "roles": ["portal"] }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! 相对路径相对于 manifest 文件所在目录解析.

use super::PatientEntry;
use crate::{StencilError, StencilResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 病人列表.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// 按处理顺序排列的病人.
    pub patients: Vec<PatientEntry>,
}

impl Manifest {
    /// 从 JSON 字符串解析. 路径保持原样.
    pub fn from_json_str(s: &str) -> StencilResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// 从 JSON 文件读取, 并以文件所在目录解析相对路径.
    pub fn open<P: AsRef<Path>>(path: P) -> StencilResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(StencilError::io(path))?;
        let mut manifest = Self::from_json_str(&text)?;
        if let Some(base) = path.parent() {
            manifest.rebase(base);
        }
        Ok(manifest)
    }

    /// 将所有相对路径解析为相对于 `base`.
    fn rebase(&mut self, base: &Path) {
        for p in self.patients.iter_mut() {
            if p.ct.is_relative() {
                p.ct = base.join(&p.ct);
            }
            for m in p.masks.iter_mut().filter(|m| m.path.is_relative()) {
                m.path = base.join(&m.path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::RoleTable;
    use crate::observe::NullSink;
    use crate::patient::assemble_entry;
    use crate::patient::tests::write_patient;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"{
        "patients": [
            {
                "id": "P1",
                "ct": "P1.nii.gz",
                "masks": [
                    { "path": "P1_full.nii.gz", "key": "full" },
                    { "path": "/abs/P1_pv.nii.gz", "key": "pv", "roles": ["portal"] }
                ]
            },
            { "id": "P2", "ct": "P2.nii.gz" }
        ]
    }"#;

    #[test]
    fn test_parse() {
        let m = Manifest::from_json_str(SAMPLE).unwrap();
        assert_eq!(m.patients.len(), 2);
        assert_eq!(m.patients[0].masks[0].roles, None);
        assert_eq!(
            m.patients[0].masks[1].roles,
            Some(RoleTable::new(["portal"]))
        );
        assert!(m.patients[1].masks.is_empty());
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            Manifest::from_json_str(r#"{"patients": [{"id": "P1"}]}"#),
            Err(StencilError::Manifest(_))
        ));
    }

    #[test]
    fn test_open_rebases_relative_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("manifest.json");
        fs::write(&path, SAMPLE).unwrap();

        let m = Manifest::open(&path).unwrap();
        let p1 = &m.patients[0];
        assert_eq!(p1.ct, tmp.path().join("P1.nii.gz"));
        assert_eq!(p1.masks[0].path, tmp.path().join("P1_full.nii.gz"));
        assert_eq!(p1.masks[1].path, PathBuf::from("/abs/P1_pv.nii.gz"));
    }

    /// manifest 允许任意文件名和掩膜键, 不受文件名约定限制.
    #[test]
    fn test_assemble_from_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(
            tmp.path(),
            "case-007",
            &[("hepatic", &[((1, 1, 1), 3), ((1, 2, 1), 9)])],
        );
        let json = r#"{"patients": [{
            "id": "case-007",
            "ct": "case-007.nii.gz",
            "masks": [{ "path": "case-007_hepatic.nii.gz", "key": "hv", "roles": ["left", "right"] }]
        }]}"#;
        let path = tmp.path().join("m.json");
        fs::write(&path, json).unwrap();

        let m = Manifest::open(&path).unwrap();
        let patient = assemble_entry(&m.patients[0], &RoleTable::default(), &NullSink).unwrap();
        let keys: Vec<_> = patient.masks().keys().map(String::as_str).collect();
        assert_eq!(keys, ["hv", "hv_left", "hv_right"]);
        assert_eq!(
            patient.mask("hv_right").unwrap().foreground_pos(),
            vec![(1, 2, 1)]
        );
    }
}

//! 病人数据组装.
//!
//! 一个病人由一个 CT 文件和若干血管标签文件组成. 数据来源有两种:
//!
//! 1. 平铺目录下的文件名约定 ([`PatientEntry::from_files`], [`assemble`]);
//! 2. 显式 manifest ([`Manifest`], 需要 `serde` feature).
//!
//! 两者都先得到 [`PatientEntry`], 再由 [`assemble_entry`] 加载为 [`Patient`].

pub mod naming;

#[cfg(feature = "serde")]
mod manifest;

#[cfg(feature = "serde")]
pub use manifest::Manifest;

use crate::data::Grid;
use crate::label::{self, RoleTable};
use crate::observe::{Event, EventSink};
use crate::{BinaryMask, LabelVolume, NiftiHeaderAttr, StencilError, StencilResult};
use nifti::NiftiHeader;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 掩膜名 -> 二值掩膜的有序映射.
///
/// 掩膜以 `Arc` 共享, 分发到工作线程时不拷贝体数据.
pub type NamedMaskSet = BTreeMap<String, Arc<BinaryMask>>;

/// 一个血管标签文件.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskEntry {
    /// 文件路径.
    pub path: PathBuf,

    /// 掩膜键. 拆分出的结构以 `<key>_<role>` 命名.
    pub key: String,

    /// 该文件专用的角色表. 缺省时使用组装参数中的角色表.
    #[cfg_attr(feature = "serde", serde(default))]
    pub roles: Option<RoleTable>,
}

/// 一个病人的全部输入文件.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PatientEntry {
    /// 病人 ID. 同时是输出子目录名.
    pub id: String,

    /// CT 文件路径.
    pub ct: PathBuf,

    /// 血管标签文件.
    #[cfg_attr(feature = "serde", serde(default))]
    pub masks: Vec<MaskEntry>,
}

impl PatientEntry {
    /// 按文件名约定从平铺的文件列表中提取病人 `patient_id` 的文件.
    ///
    /// - 文件名 (去掉扩展名后) 等于 `patient_id`, 或以 `patient_id` 加分隔符开头的文件属于该病人;
    /// - 文件名恰为 `patient_id` 的是 CT 文件, 其余为血管标签文件;
    /// - 掩膜键为文件名的最后 `key_len` 个字符.
    ///
    /// # 返回值
    ///
    /// 没有 CT 文件时返回 [`StencilError::MissingCt`];
    /// 有多个 CT 文件 (如同时存在 `P.nii` 和 `P.nii.gz`) 时返回 [`StencilError::AmbiguousCt`].
    pub fn from_files<P: AsRef<Path>>(
        patient_id: &str,
        files: &[P],
        key_len: usize,
    ) -> StencilResult<Self> {
        let mut cts = Vec::with_capacity(1);
        let mut masks = Vec::new();
        for path in files.iter().map(AsRef::as_ref) {
            let Some(stem) = naming::volume_stem(path) else {
                continue;
            };
            if !naming::belongs_to(stem, patient_id) {
                continue;
            }
            if stem == patient_id {
                cts.push(path.to_owned());
            } else {
                masks.push(MaskEntry {
                    path: path.to_owned(),
                    key: naming::mask_key(stem, key_len).to_owned(),
                    roles: None,
                });
            }
        }

        let ct = match cts.len() {
            0 => {
                return Err(StencilError::MissingCt {
                    patient: patient_id.to_owned(),
                })
            }
            1 => cts.swap_remove(0),
            count => {
                return Err(StencilError::AmbiguousCt {
                    patient: patient_id.to_owned(),
                    count,
                })
            }
        };
        Ok(Self {
            id: patient_id.to_owned(),
            ct,
            masks,
        })
    }
}

/// 组装参数.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// 默认角色表.
    pub roles: RoleTable,

    /// 文件名约定下的掩膜键长度.
    pub key_len: usize,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            roles: RoleTable::default(),
            key_len: crate::consts::MASK_KEY_LEN,
        }
    }
}

/// 组装完成的病人数据.
#[derive(Debug, Clone)]
pub struct Patient {
    id: String,
    ct_path: PathBuf,
    ct_header: Box<NiftiHeader>,
    masks: NamedMaskSet,
    n_ves: usize,
}

impl NiftiHeaderAttr for Patient {
    /// CT 的 header.
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.ct_header
    }
}

impl Patient {
    /// 病人 ID.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// CT 文件路径.
    #[inline]
    pub fn ct_path(&self) -> &Path {
        &self.ct_path
    }

    /// CT 网格. 所有掩膜都与之一致.
    #[inline]
    pub fn grid(&self) -> Grid {
        Grid::from_header(&self.ct_header)
    }

    /// 命名掩膜集合.
    #[inline]
    pub fn masks(&self) -> &NamedMaskSet {
        &self.masks
    }

    /// 获取名为 `key` 的掩膜.
    #[inline]
    pub fn mask(&self, key: &str) -> Option<&Arc<BinaryMask>> {
        self.masks.get(key)
    }

    /// 输入的血管标签文件个数 (不是拆分后的掩膜个数).
    #[inline]
    pub fn n_ves(&self) -> usize {
        self.n_ves
    }

    /// 消费自我, 获得命名掩膜集合.
    #[inline]
    pub fn into_masks(self) -> NamedMaskSet {
        self.masks
    }
}

/// 由 [`PatientEntry`] 加载病人数据.
///
/// CT 只读取 header, 用于校验网格. 每个血管标签文件:
///
/// 1. 二值化后以 `key` 存入集合;
/// 2. 按角色表拆分, 每个结构以 `<key>_<role>` 存入集合.
///
/// 任一文件无法读取、网格与 CT 不一致、标签数超出角色表或掩膜键重复时,
/// 整个病人失败, 不返回部分结果.
pub fn assemble_entry(
    entry: &PatientEntry,
    roles: &RoleTable,
    sink: &dyn EventSink,
) -> StencilResult<Patient> {
    let ct_header =
        NiftiHeader::from_file(&entry.ct).map_err(StencilError::nifti(&entry.ct))?;
    let ct_grid = Grid::from_header(&ct_header);

    let mut masks = NamedMaskSet::new();
    let mut insert = |key: String, mask: BinaryMask| {
        if masks.contains_key(&key) {
            return Err(StencilError::DuplicateMaskKey {
                patient: entry.id.clone(),
                key,
            });
        }
        masks.insert(key, Arc::new(mask));
        Ok(())
    };

    for m in entry.masks.iter() {
        let label = LabelVolume::open(&m.path)?;
        ct_grid.ensure_matches(&label.grid())?;

        let parts = label::separate_named(&label, m.roles.as_ref().unwrap_or(roles))?;
        insert(m.key.clone(), label.to_binary())?;
        for (role, part) in parts {
            insert(format!("{}_{role}", m.key), part)?;
        }
    }

    let patient = Patient {
        id: entry.id.clone(),
        ct_path: entry.ct.clone(),
        ct_header: Box::new(ct_header),
        masks,
        n_ves: entry.masks.len(),
    };
    sink.emit(Event::PatientAssembled {
        patient: patient.id.clone(),
        masks: patient.masks.len(),
        n_ves: patient.n_ves,
    });
    Ok(patient)
}

/// 按文件名约定从平铺文件列表组装病人 `patient_id`.
///
/// 等价于 [`PatientEntry::from_files`] 之后 [`assemble_entry`].
pub fn assemble<P: AsRef<Path>>(
    patient_id: &str,
    files: &[P],
    options: &AssembleOptions,
    sink: &dyn EventSink,
) -> StencilResult<Patient> {
    let entry = PatientEntry::from_files(patient_id, files, options.key_len)?;
    assemble_entry(&entry, &options.roles, sink)
}

/// 列出目录 `dir` 下所有扩展名为 `.nii` 或 `.nii.gz` 的文件, 按文件名排序.
pub fn list_volumes<P: AsRef<Path>>(dir: P) -> StencilResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for item in fs::read_dir(dir).map_err(StencilError::io(dir))? {
        let path = item.map_err(StencilError::io(dir))?.path();
        let is_volume = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".nii") || n.ends_with(".nii.gz"));
        if is_volume && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 按文件名约定扫描目录 `dir`, 为每个推断出的病人生成 [`PatientEntry`].
///
/// 单个病人的文件不完整 (如缺少 CT) 时, 该病人对应位置为 `Err`, 不影响其他病人.
pub fn discover<P: AsRef<Path>>(
    dir: P,
    id_len: usize,
    key_len: usize,
) -> StencilResult<Vec<(String, StencilResult<PatientEntry>)>> {
    let files = list_volumes(dir)?;
    Ok(naming::patient_ids(&files, id_len)
        .into_iter()
        .map(|id| {
            let entry = PatientEntry::from_files(&id, &files, key_len);
            (id, entry)
        })
        .collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::observe::{NullSink, RecordingSink};
    use crate::NiftiWrite;
    use ndarray::Array3;

    pub(crate) const SHAPE: (usize, usize, usize) = (6, 7, 8);
    pub(crate) const SPACING: [f64; 3] = [2.0, 0.8, 0.8];

    /// 在 `dir` 下写入一个 CT 和给定的血管标签文件 `(后缀, [(位置, 标签值)])`.
    pub(crate) fn write_patient(
        dir: &Path,
        id: &str,
        masks: &[(&str, &[((usize, usize, usize), u16)])],
    ) {
        let ct = crate::Volume::<f32>::from_raw(Array3::from_elem(SHAPE, -100.0), SPACING);
        ct.save(dir.join(format!("{id}.nii.gz"))).unwrap();
        for (suffix, voxels) in masks {
            let mut label = LabelVolume::from_raw(Array3::zeros(SHAPE), SPACING);
            for &(pos, value) in voxels.iter() {
                label[pos] = value;
            }
            label
                .save(dir.join(format!("{id}_{suffix}.nii.gz")))
                .unwrap();
        }
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        list_volumes(dir).unwrap()
    }

    #[test]
    fn test_from_files_missing_and_ambiguous_ct() {
        let files = [PathBuf::from("P1_full.nii")];
        assert!(matches!(
            PatientEntry::from_files("P1", &files, 4),
            Err(StencilError::MissingCt { .. })
        ));

        let files = [PathBuf::from("P1.nii"), PathBuf::from("P1.nii.gz")];
        assert!(matches!(
            PatientEntry::from_files("P1", &files, 4),
            Err(StencilError::AmbiguousCt { count: 2, .. })
        ));
    }

    /// `P1` 与 `P10` 共存时, 文件按分隔符归属, 互不混淆.
    #[test]
    fn test_from_files_prefix_patients() {
        let files: Vec<PathBuf> = ["P1.nii", "P1_full.nii", "P10.nii", "P10_full.nii", "P10_aort.nii"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let p1 = PatientEntry::from_files("P1", &files, 4).unwrap();
        assert_eq!(p1.ct, PathBuf::from("P1.nii"));
        assert_eq!(p1.masks.len(), 1);
        assert_eq!(p1.masks[0].key, "full");

        let p10 = PatientEntry::from_files("P10", &files, 4).unwrap();
        assert_eq!(p10.ct, PathBuf::from("P10.nii"));
        let keys: Vec<_> = p10.masks.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, ["full", "aort"]);
    }

    #[test]
    fn test_assemble_separates_masks() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(
            tmp.path(),
            "P1",
            &[
                ("full", &[((2, 3, 3), 1), ((2, 3, 5), 2)]),
                ("aort", &[((4, 1, 1), 7)]),
            ],
        );
        let sink = RecordingSink::default();
        let patient = assemble(
            "P1",
            &files_in(tmp.path()),
            &AssembleOptions::default(),
            &sink,
        )
        .unwrap();

        assert_eq!(patient.id(), "P1");
        assert_eq!(patient.n_ves(), 2);
        assert_eq!(patient.grid().shape, SHAPE);
        let keys: Vec<_> = patient.masks().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["aort", "aort_vein", "full", "full_artery", "full_vein"]
        );

        let full = patient.mask("full").unwrap();
        assert_eq!(full.foreground_pos(), vec![(2, 3, 3), (2, 3, 5)]);
        assert_eq!(
            patient.mask("full_vein").unwrap().foreground_pos(),
            vec![(2, 3, 3)]
        );
        assert_eq!(
            patient.mask("full_artery").unwrap().foreground_pos(),
            vec![(2, 3, 5)]
        );

        assert_eq!(
            sink.take(),
            vec![Event::PatientAssembled {
                patient: "P1".into(),
                masks: 5,
                n_ves: 2,
            }]
        );
    }

    /// 没有血管标签文件的病人: `n_ves == 0`, 集合为空.
    #[test]
    fn test_assemble_without_masks() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(tmp.path(), "P2", &[]);
        let patient = assemble(
            "P2",
            &files_in(tmp.path()),
            &AssembleOptions::default(),
            &NullSink,
        )
        .unwrap();
        assert_eq!(patient.n_ves(), 0);
        assert!(patient.masks().is_empty());
    }

    #[test]
    fn test_assemble_rejects_grid_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(tmp.path(), "P3", &[]);
        LabelVolume::from_raw(Array3::zeros((1, 2, 3)), SPACING)
            .save(tmp.path().join("P3_full.nii.gz"))
            .unwrap();
        let err = assemble(
            "P3",
            &files_in(tmp.path()),
            &AssembleOptions::default(),
            &NullSink,
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::GridMismatch { .. }));
    }

    #[test]
    fn test_assemble_unreadable_file_fails_patient() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(tmp.path(), "P4", &[("full", &[((1, 1, 1), 1)])]);
        std::fs::write(tmp.path().join("P4_bad1.nii"), b"not a nifti").unwrap();
        let err = assemble(
            "P4",
            &files_in(tmp.path()),
            &AssembleOptions::default(),
            &NullSink,
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::Nifti { .. }));
    }

    #[test]
    fn test_assemble_too_many_labels() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(
            tmp.path(),
            "P5",
            &[("full", &[((1, 1, 1), 1), ((1, 1, 2), 2), ((1, 1, 3), 3)])],
        );
        let files = files_in(tmp.path());
        let err = assemble("P5", &files, &AssembleOptions::default(), &NullSink).unwrap_err();
        assert!(matches!(err, StencilError::TooManyLabels { found: 3, .. }));

        let options = AssembleOptions {
            roles: RoleTable::new(["vein", "artery", "portal"]),
            ..Default::default()
        };
        let patient = assemble("P5", &files, &options, &NullSink).unwrap();
        assert!(patient.mask("full_portal").is_some());
    }

    #[test]
    fn test_duplicate_mask_key() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(tmp.path(), "P6", &[("full", &[((1, 1, 1), 1)])]);
        let full = tmp.path().join("P6_full.nii.gz");
        let entry = PatientEntry {
            id: "P6".into(),
            ct: tmp.path().join("P6.nii.gz"),
            masks: vec![
                MaskEntry {
                    path: full.clone(),
                    key: "full".into(),
                    roles: None,
                },
                MaskEntry {
                    path: full,
                    key: "full".into(),
                    roles: None,
                },
            ],
        };
        let err = assemble_entry(&entry, &RoleTable::default(), &NullSink).unwrap_err();
        assert!(matches!(err, StencilError::DuplicateMaskKey { .. }));
    }

    #[test]
    fn test_discover() {
        let tmp = tempfile::tempdir().unwrap();
        write_patient(tmp.path(), "AAAA", &[("full", &[((1, 1, 1), 1)])]);
        write_patient(tmp.path(), "BBBB", &[]);
        std::fs::write(tmp.path().join("CCCC_full.nii"), b"").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"").unwrap();

        let found = discover(tmp.path(), 4, 4).unwrap();
        let ids: Vec<_> = found.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["AAAA", "BBBB", "CCCC"]);
        assert_eq!(found[0].1.as_ref().unwrap().masks.len(), 1);
        assert!(found[1].1.as_ref().unwrap().masks.is_empty());
        assert!(matches!(found[2].1, Err(StencilError::MissingCt { .. })));
    }
}

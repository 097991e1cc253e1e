//! 任务单元与病人的运行结果.

use crate::StencilResult;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 单个任务单元的结果.
#[derive(Debug)]
pub struct UnitReport {
    /// 掩膜键.
    pub key: String,

    /// 距离 (毫米).
    pub distance: f64,

    /// 计算与保存的耗时.
    pub elapsed: Duration,

    /// 保存路径, 或失败原因.
    pub outcome: StencilResult<PathBuf>,
}

impl UnitReport {
    /// 是否成功保存.
    #[inline]
    pub fn is_saved(&self) -> bool {
        self.outcome.is_ok()
    }

    /// 保存路径.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.outcome.as_deref().ok()
    }
}

/// 一个病人全部任务单元的结果, 按 (掩膜键, 距离) 排序.
#[derive(Debug)]
pub struct PatientReport {
    patient: String,
    units: Vec<UnitReport>,
}

impl PatientReport {
    pub(crate) fn new(patient: &str, mut units: Vec<UnitReport>) -> Self {
        units.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.distance.total_cmp(&b.distance))
        });
        Self {
            patient: patient.to_owned(),
            units,
        }
    }

    /// 病人 ID.
    #[inline]
    pub fn patient(&self) -> &str {
        &self.patient
    }

    /// 全部任务单元结果.
    #[inline]
    pub fn units(&self) -> &[UnitReport] {
        &self.units
    }

    /// 任务单元个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// 是否没有任何任务单元.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// 所有已保存的路径.
    pub fn saved(&self) -> impl Iterator<Item = &Path> {
        self.units.iter().filter_map(UnitReport::path)
    }

    /// 所有失败的任务单元.
    pub fn failures(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| !u.is_saved())
    }

    /// 成功个数.
    pub fn n_saved(&self) -> usize {
        self.saved().count()
    }

    /// 失败个数.
    pub fn n_failed(&self) -> usize {
        self.failures().count()
    }

    /// 是否全部成功. 没有任务单元时也视为成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.n_failed() == 0
    }

    /// 所有任务单元耗时之和 (机器时间, 不是墙钟时间).
    pub fn total_elapsed(&self) -> Duration {
        self.units.iter().map(|u| u.elapsed).sum()
    }

    /// 最耗时的任务单元.
    pub fn slowest(&self) -> Option<&UnitReport> {
        self.units.iter().max_by_key(|u| u.elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StencilError;

    fn unit(key: &str, distance: f64, ms: u64, ok: bool) -> UnitReport {
        UnitReport {
            key: key.to_owned(),
            distance,
            elapsed: Duration::from_millis(ms),
            outcome: if ok {
                Ok(PathBuf::from(format!("{key}_{distance}")))
            } else {
                Err(StencilError::InvalidDistance(distance))
            },
        }
    }

    #[test]
    fn test_summary() {
        let report = PatientReport::new(
            "P",
            vec![
                unit("b", 2.0, 5, true),
                unit("a", 3.0, 1, false),
                unit("a", 2.0, 9, true),
            ],
        );
        let keys: Vec<_> = report
            .units()
            .iter()
            .map(|u| (u.key.as_str(), u.distance))
            .collect();
        assert_eq!(keys, [("a", 2.0), ("a", 3.0), ("b", 2.0)]);

        assert_eq!(report.patient(), "P");
        assert_eq!(report.n_saved(), 2);
        assert_eq!(report.n_failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.total_elapsed(), Duration::from_millis(15));
        assert_eq!(report.slowest().map(|u| u.key.as_str()), Some("a"));

        let saved: Vec<_> = report.saved().collect();
        assert_eq!(saved, [Path::new("a_2"), Path::new("b_2")]);
    }

    #[test]
    fn test_empty_is_success() {
        let report = PatientReport::new("P", Vec::new());
        assert!(report.is_empty());
        assert!(report.is_success());
        assert!(report.slowest().is_none());
    }
}

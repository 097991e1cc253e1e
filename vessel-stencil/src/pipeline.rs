//! 批处理流程: 发现病人, 逐个组装并分发任务.
//!
//! 病人之间严格串行. 单个病人失败 (文件缺失、网格不一致、移除掩膜缺失等)
//! 只记录在 [`BatchReport`] 中, 不影响后续病人.

use crate::config::PipelineConfig;
use crate::observe::{Event, EventSink};
use crate::patient::{self, PatientEntry};
use crate::schedule::{JobScheduler, PatientReport, RemovalPolicy};
use crate::{StencilError, StencilResult};
use std::sync::Arc;

/// 一个待处理的病人: ID 与其输入文件 (或者无法确定输入文件的原因).
pub type PendingPatient = (String, StencilResult<PatientEntry>);

/// 整批运行结果.
#[derive(Debug, Default)]
pub struct BatchReport {
    reports: Vec<PatientReport>,
    failed: Vec<(String, StencilError)>,
}

impl BatchReport {
    /// 已分发任务的病人结果, 按处理顺序.
    #[inline]
    pub fn reports(&self) -> &[PatientReport] {
        &self.reports
    }

    /// 整体失败的病人及原因.
    #[inline]
    pub fn failed_patients(&self) -> &[(String, StencilError)] {
        &self.failed
    }

    /// 处理过的病人总数.
    #[inline]
    pub fn n_patients(&self) -> usize {
        self.reports.len() + self.failed.len()
    }

    /// 成功保存的掩膜总数.
    pub fn n_units_saved(&self) -> usize {
        self.reports.iter().map(PatientReport::n_saved).sum()
    }

    /// 失败的任务单元总数.
    pub fn n_units_failed(&self) -> usize {
        self.reports.iter().map(PatientReport::n_failed).sum()
    }

    /// 所有病人和任务单元是否都成功.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.reports.iter().all(PatientReport::is_success)
    }
}

/// 批处理流程.
pub struct Pipeline {
    config: PipelineConfig,
    scheduler: JobScheduler,
    removal: RemovalPolicy,
    sink: Arc<dyn EventSink>,
}

impl Pipeline {
    /// 由配置创建流程. 距离中含有 NaN 时返回 [`StencilError::InvalidDistance`].
    pub fn new(config: PipelineConfig, sink: Arc<dyn EventSink>) -> StencilResult<Self> {
        config.validate()?;
        let scheduler = JobScheduler::new(&config.output_root, config.workers, Arc::clone(&sink))
            .with_extension(config.extension.as_str());
        Ok(Self {
            removal: RemovalPolicy::Key(config.removal_key.clone()),
            config,
            scheduler,
            sink,
        })
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 调度器.
    #[inline]
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// 确定待处理的病人. 配置了 manifest 时读取 manifest, 否则按文件名约定扫描输入目录.
    pub fn entries(&self) -> StencilResult<Vec<PendingPatient>> {
        match self.manifest_entries()? {
            Some(entries) => Ok(entries),
            None => patient::discover(
                &self.config.input_dir,
                self.config.id_len,
                self.config.key_len,
            ),
        }
    }

    #[cfg(feature = "serde")]
    fn manifest_entries(&self) -> StencilResult<Option<Vec<PendingPatient>>> {
        let Some(path) = self.config.manifest.as_ref() else {
            return Ok(None);
        };
        let manifest = patient::Manifest::open(path)?;
        Ok(Some(
            manifest
                .patients
                .into_iter()
                .map(|e| (e.id.clone(), Ok(e)))
                .collect(),
        ))
    }

    #[cfg(not(feature = "serde"))]
    fn manifest_entries(&self) -> StencilResult<Option<Vec<PendingPatient>>> {
        if self.config.manifest.is_some() {
            log::warn!("manifest ignored: built without the `serde` feature");
        }
        Ok(None)
    }

    /// 处理单个病人: 组装, 然后运行全部任务单元.
    ///
    /// 组装失败或移除掩膜缺失时返回 `Err`, 并发出 [`Event::PatientFailed`].
    pub fn run_patient(&self, entry: &PatientEntry) -> StencilResult<PatientReport> {
        self.try_run_patient(entry).map_err(|e| {
            self.patient_failed(&entry.id, &e);
            e
        })
    }

    fn try_run_patient(&self, entry: &PatientEntry) -> StencilResult<PatientReport> {
        let patient = patient::assemble_entry(entry, &self.config.roles, &*self.sink)?;
        let masks = patient.masks();
        let distances = &self.config.distances;
        if self.config.serial {
            self.scheduler
                .run_serial(patient.id(), masks, distances, &self.removal)
        } else {
            self.scheduler.run(patient.id(), masks, distances, &self.removal)
        }
    }

    fn patient_failed(&self, patient: &str, error: &StencilError) {
        self.sink.emit(Event::PatientFailed {
            patient: patient.to_owned(),
            error: error.to_string(),
        });
    }

    /// 依次处理所有病人. 单个病人失败不影响其它病人.
    pub fn run_batch<I>(&self, patients: I) -> BatchReport
    where
        I: IntoIterator<Item = PendingPatient>,
    {
        let mut batch = BatchReport::default();
        for (id, entry) in patients {
            let outcome = match entry {
                Ok(entry) => self.run_patient(&entry),
                Err(e) => {
                    self.patient_failed(&id, &e);
                    Err(e)
                }
            };
            match outcome {
                Ok(report) => batch.reports.push(report),
                Err(e) => batch.failed.push((id, e)),
            }
        }
        batch
    }

    /// [`Self::entries`] 之后 [`Self::run_batch`].
    pub fn run(&self) -> StencilResult<BatchReport> {
        Ok(self.run_batch(self.entries()?))
    }
}

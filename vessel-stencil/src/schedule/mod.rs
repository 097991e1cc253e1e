//! 任务分发.
//!
//! 一个病人的每个 (掩膜, 距离) 组合是一个独立的任务单元 [`ShellJob`].
//! [`JobScheduler::run`] 将所有任务单元提交给固定大小的线程池,
//! 并在 join 屏障处等待全部结束, 然后汇总为 [`PatientReport`].
//!
//! 单个任务单元的错误 (包括 panic) 只记录在其自身的 [`UnitReport`] 中,
//! 不影响同一病人的其它任务单元.

mod report;

pub use report::{PatientReport, UnitReport};

use crate::consts::FULL_KEY;
use crate::observe::{Event, EventSink};
use crate::patient::{naming, NamedMaskSet};
use crate::{shell, write_mask, BinaryMask, StencilError, StencilResult};
use itertools::iproduct;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

/// 移除掩膜的来源.
#[derive(Debug, Clone)]
pub enum RemovalPolicy {
    /// 使用病人掩膜集合中名为该键的掩膜.
    Key(String),

    /// 使用调用方给定的掩膜.
    Mask(Arc<BinaryMask>),
}

impl Default for RemovalPolicy {
    /// `Key("full")`.
    fn default() -> Self {
        Self::Key(FULL_KEY.to_owned())
    }
}

impl RemovalPolicy {
    /// 在病人 `patient` 的掩膜集合 `masks` 中解析出移除掩膜.
    ///
    /// 指定的键不存在时返回 [`StencilError::MissingRemovalMask`].
    pub fn resolve(&self, patient: &str, masks: &NamedMaskSet) -> StencilResult<Arc<BinaryMask>> {
        match self {
            Self::Key(key) => {
                masks
                    .get(key)
                    .cloned()
                    .ok_or_else(|| StencilError::MissingRemovalMask {
                        patient: patient.to_owned(),
                        key: key.clone(),
                    })
            }
            Self::Mask(mask) => Ok(Arc::clone(mask)),
        }
    }
}

/// 一个任务单元: 对 (病人, 掩膜, 距离) 计算血管周围空间并保存.
#[derive(Debug, Clone)]
pub struct ShellJob {
    patient: String,
    key: String,
    distance: f64,
    vessel: Arc<BinaryMask>,
    removal: Arc<BinaryMask>,
    dir: PathBuf,
    extension: String,
}

impl ShellJob {
    /// 病人 ID.
    #[inline]
    pub fn patient(&self) -> &str {
        &self.patient
    }

    /// 掩膜键.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 距离 (毫米).
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// 计算并保存, 返回保存路径.
    pub fn execute(&self) -> StencilResult<PathBuf> {
        let shell = shell::compute_shell(&self.vessel, self.distance, &self.removal)?;
        write_mask(
            &shell,
            &self.dir,
            &naming::shell_filename(&self.key, self.distance, &self.extension),
        )
    }

    /// 执行并汇报. panic 会被捕获为 [`StencilError::UnitPanicked`].
    ///
    /// 事件也在捕获范围内发出, 因此 `sink` 的 panic 同样只影响本任务单元.
    pub fn run(&self, sink: &dyn EventSink) -> UnitReport {
        let since = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.emit(Event::UnitStarted {
                patient: self.patient.clone(),
                key: self.key.clone(),
                distance: self.distance,
            });
            let outcome = self.execute();
            sink.emit(self.finished_event(&outcome));
            outcome
        }))
        .unwrap_or_else(|payload| Err(StencilError::UnitPanicked(panic_message(&*payload))));

        self.report(since.elapsed(), outcome)
    }

    fn finished_event(&self, outcome: &StencilResult<PathBuf>) -> Event {
        match outcome {
            Ok(path) => Event::UnitSaved {
                patient: self.patient.clone(),
                key: self.key.clone(),
                distance: self.distance,
                path: path.clone(),
            },
            Err(e) => Event::UnitFailed {
                patient: self.patient.clone(),
                key: self.key.clone(),
                distance: self.distance,
                error: e.to_string(),
            },
        }
    }

    fn report(&self, elapsed: Duration, outcome: StencilResult<PathBuf>) -> UnitReport {
        UnitReport {
            key: self.key.clone(),
            distance: self.distance,
            elapsed,
            outcome,
        }
    }
}

/// 提取 panic 信息.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// 任务调度器.
///
/// 病人之间串行, 同一病人的任务单元在至多 `workers` 个线程上并行.
/// 所有掩膜以 `Arc` 共享给工作线程, 只读.
pub struct JobScheduler {
    output_root: PathBuf,
    workers: usize,
    extension: String,
    sink: Arc<dyn EventSink>,
}

impl JobScheduler {
    /// 创建调度器. `workers` 至少为 1.
    pub fn new<P: Into<PathBuf>>(output_root: P, workers: usize, sink: Arc<dyn EventSink>) -> Self {
        Self {
            output_root: output_root.into(),
            workers: workers.max(1),
            extension: crate::consts::DEFAULT_EXTENSION.to_owned(),
            sink,
        }
    }

    /// 设置输出文件扩展名 (不含前导 `.`), 如 `nii` 或 `nii.gz`.
    pub fn with_extension<S: Into<String>>(mut self, extension: S) -> Self {
        self.extension = extension.into();
        self
    }

    /// 线程池大小.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 输出根目录.
    #[inline]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// 病人 `patient` 的输出目录: `<output_root>/<patient>`.
    #[inline]
    pub fn patient_dir(&self, patient: &str) -> PathBuf {
        self.output_root.join(patient)
    }

    /// 展开病人 `patient` 的全部任务单元: 掩膜 × 距离 的笛卡尔积.
    ///
    /// 掩膜或距离为空时得到空列表, 此时不解析移除掩膜.
    pub fn jobs(
        &self,
        patient: &str,
        masks: &NamedMaskSet,
        distances: &[f64],
        removal: &RemovalPolicy,
    ) -> StencilResult<Vec<ShellJob>> {
        if masks.is_empty() || distances.is_empty() {
            return Ok(Vec::new());
        }
        let removal = removal.resolve(patient, masks)?;
        let dir = self.patient_dir(patient);

        Ok(iproduct!(masks.iter(), distances.iter())
            .map(|((key, vessel), &distance)| ShellJob {
                patient: patient.to_owned(),
                key: key.clone(),
                distance,
                vessel: Arc::clone(vessel),
                removal: Arc::clone(&removal),
                dir: dir.clone(),
                extension: self.extension.clone(),
            })
            .collect())
    }

    /// 在线程池上运行病人 `patient` 的全部任务单元, 等待全部结束后返回汇总.
    ///
    /// # 返回值
    ///
    /// 移除掩膜无法解析时返回 `Err`, 且不会分发任何任务单元.
    /// 其余情况返回 `Ok`, 各任务单元的失败记录在 [`PatientReport`] 中.
    pub fn run(
        &self,
        patient: &str,
        masks: &NamedMaskSet,
        distances: &[f64],
        removal: &RemovalPolicy,
    ) -> StencilResult<PatientReport> {
        let jobs = self.jobs(patient, masks, distances, removal)?;
        let n = jobs.len();
        if n == 0 {
            return Ok(self.finish(patient, Vec::new()));
        }

        let pool = threadpool::Builder::new()
            .num_threads(self.workers.min(n))
            .thread_name(format!("stencil-{patient}"))
            .build();
        let (tx, rx) = mpsc::channel();
        let mut slots: Vec<Option<UnitReport>> = Vec::with_capacity(n);
        let mut lost = Vec::with_capacity(n);
        for (i, job) in jobs.into_iter().enumerate() {
            slots.push(None);
            lost.push(job.report(
                Duration::ZERO,
                Err(StencilError::UnitPanicked("worker exited without a report".to_owned())),
            ));
            let tx = tx.clone();
            let sink = Arc::clone(&self.sink);
            pool.execute(move || {
                // 接收端只会在屏障之后释放.
                let _ = tx.send((i, job.run(&*sink)));
            });
        }
        drop(tx);
        pool.join();

        for (i, unit) in rx.try_iter() {
            slots[i] = Some(unit);
        }
        // 没有汇报的任务单元记为 panic, 保证每个任务单元恰有一条结果.
        let units = slots
            .into_iter()
            .zip(lost)
            .map(|(slot, lost)| slot.unwrap_or(lost))
            .collect();
        Ok(self.finish(patient, units))
    }

    /// 在当前线程依次运行病人 `patient` 的全部任务单元. 结果与 [`Self::run`] 相同.
    pub fn run_serial(
        &self,
        patient: &str,
        masks: &NamedMaskSet,
        distances: &[f64],
        removal: &RemovalPolicy,
    ) -> StencilResult<PatientReport> {
        let units = self
            .jobs(patient, masks, distances, removal)?
            .iter()
            .map(|job| job.run(&*self.sink))
            .collect();
        Ok(self.finish(patient, units))
    }

    fn finish(&self, patient: &str, units: Vec<UnitReport>) -> PatientReport {
        let report = PatientReport::new(patient, units);
        self.sink.emit(Event::PatientDone {
            patient: patient.to_owned(),
            saved: report.n_saved(),
            failed: report.n_failed(),
        });
        report
    }
}

//! 运行事件.
//!
//! 库本身不做任何全局日志初始化. 各组件接收一个 [`EventSink`],
//! 由调用方决定事件的去向: 转发给 `log` ([`LogSink`]), 丢弃 ([`NullSink`]),
//! 或者在测试中记录下来.

use std::path::PathBuf;

/// 结构化运行事件. 任务单元相关事件都携带 (病人, 掩膜键, 距离), 足以复现问题.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// 病人数据组装完成.
    PatientAssembled {
        /// 病人 ID.
        patient: String,
        /// 命名掩膜个数.
        masks: usize,
        /// 输入血管标签文件个数.
        n_ves: usize,
    },

    /// 任务单元开始计算.
    UnitStarted {
        /// 病人 ID.
        patient: String,
        /// 掩膜键.
        key: String,
        /// 距离 (毫米).
        distance: f64,
    },

    /// 任务单元已保存结果.
    UnitSaved {
        /// 病人 ID.
        patient: String,
        /// 掩膜键.
        key: String,
        /// 距离 (毫米).
        distance: f64,
        /// 保存路径.
        path: PathBuf,
    },

    /// 任务单元失败.
    UnitFailed {
        /// 病人 ID.
        patient: String,
        /// 掩膜键.
        key: String,
        /// 距离 (毫米).
        distance: f64,
        /// 错误描述.
        error: String,
    },

    /// 病人的所有任务单元均已结束 (join 屏障之后).
    PatientDone {
        /// 病人 ID.
        patient: String,
        /// 成功个数.
        saved: usize,
        /// 失败个数.
        failed: usize,
    },

    /// 病人整体失败 (组装失败或移除掩膜缺失), 未分发任何任务单元.
    PatientFailed {
        /// 病人 ID.
        patient: String,
        /// 错误描述.
        error: String,
    },
}

/// 事件接收端. 会被多个工作线程同时调用.
pub trait EventSink: Send + Sync {
    /// 接收一个事件.
    fn emit(&self, event: Event);
}

/// 将事件转发给 `log` 门面.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Event) {
        match event {
            Event::PatientAssembled {
                patient,
                masks,
                n_ves,
            } => log::info!("[{patient}] assembled {masks} masks from {n_ves} vessel files"),
            Event::UnitStarted {
                patient,
                key,
                distance,
            } => log::debug!("[{patient}] unit ({key}, {distance}) started"),
            Event::UnitSaved {
                patient,
                key,
                distance,
                path,
            } => log::info!(
                "[{patient}] unit ({key}, {distance}) saved to {}",
                path.display()
            ),
            Event::UnitFailed {
                patient,
                key,
                distance,
                error,
            } => log::error!("[{patient}] unit ({key}, {distance}) failed: {error}"),
            Event::PatientDone {
                patient,
                saved,
                failed,
            } => {
                if failed == 0 {
                    log::info!("[{patient}] done: {saved} masks saved");
                } else {
                    log::warn!("[{patient}] done: {saved} masks saved, {failed} failed");
                }
            }
            Event::PatientFailed { patient, error } => {
                log::error!("[{patient}] skipped: {error}")
            }
        }
    }
}

/// 丢弃所有事件.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    #[inline]
    fn emit(&self, _event: Event) {}
}

/// 记录所有事件, 供测试检查.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    events: std::sync::Mutex<Vec<Event>>,
}

#[cfg(test)]
impl RecordingSink {
    /// 取出目前记录的全部事件.
    pub(crate) fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_sink_accepts_every_event() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Trace)
            .init();
        let events = [
            Event::PatientAssembled {
                patient: "P1".into(),
                masks: 3,
                n_ves: 1,
            },
            Event::UnitStarted {
                patient: "P1".into(),
                key: "full".into(),
                distance: 2.0,
            },
            Event::UnitSaved {
                patient: "P1".into(),
                key: "full".into(),
                distance: 2.0,
                path: PathBuf::from("P1/mask_full_2.nii.gz"),
            },
            Event::UnitFailed {
                patient: "P1".into(),
                key: "full".into(),
                distance: 3.0,
                error: "boom".into(),
            },
            Event::PatientDone {
                patient: "P1".into(),
                saved: 1,
                failed: 1,
            },
            Event::PatientFailed {
                patient: "P2".into(),
                error: "no CT".into(),
            },
        ];
        for e in events {
            LogSink.emit(e.clone());
            NullSink.emit(e);
        }
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::default();
        sink.emit(Event::PatientFailed {
            patient: "P".into(),
            error: "x".into(),
        });
        assert_eq!(sink.take().len(), 1);
        assert!(sink.take().is_empty());
    }
}

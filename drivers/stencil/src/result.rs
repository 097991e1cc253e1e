//! 运行结果.

use std::io::{self, Write};
use std::time::Duration;
use vessel_stencil::pipeline::BatchReport;
use vessel_stencil::schedule::PatientReport;

/// 将单个病人的结果写进 `w` 中.
fn describe_into<W: Write>(r: &PatientReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Patient `{}`:", r.patient())?;
    writeln!(w, "{S4}Units: {}", r.len())?;
    writeln!(w, "{S4}Saved: {}", r.n_saved())?;
    writeln!(w, "{S4}Failed: {}", r.n_failed())?;
    for u in r.failures() {
        if let Err(e) = &u.outcome {
            writeln!(w, "{S4}{S4}({}, {}): {e}", u.key, u.distance)?;
        }
    }
    writeln!(w, "{S4}Total machine time: {} ms", r.total_elapsed().as_millis())?;
    match r.slowest() {
        Some(u) => write!(
            w,
            "{S4}Most time-consuming unit ({}, {}) costs {} ms",
            u.key,
            u.distance,
            u.elapsed.as_millis()
        ),
        None => write!(w, "{S4}Most time-consuming unit: /"),
    }
}

/// 整批运行的最终结果.
pub struct StencilRunResult {
    batch: BatchReport,
    wall: Duration,
}

impl StencilRunResult {
    pub fn new(batch: BatchReport, wall: Duration) -> Self {
        Self { batch, wall }
    }

    /// 所有病人和任务单元是否都成功.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.batch.is_success()
    }

    /// 打印运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for report in self.batch.reports() {
            describe_into(report, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();

            utils::sep();
        }

        for (id, e) in self.batch.failed_patients() {
            println!("Patient `{id}` skipped: {e}");
        }
        println!(
            "{} patients, {} masks saved, {} units failed, {} patients skipped in {:.1} s",
            self.batch.n_patients(),
            self.batch.n_units_saved(),
            self.batch.n_units_failed(),
            self.batch.failed_patients().len(),
            self.wall.as_secs_f64(),
        );
    }
}

//! 为数据集中的每个病人生成血管周围空间掩膜.
//!
//! 配置来源见 `utils::loader`. 任何病人或任务单元失败时, 进程以非零状态退出.

mod result;
mod runner;

use simple_logger::SimpleLogger;
use std::process::ExitCode;

fn main() -> ExitCode {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .env()
        .init()
        .unwrap();

    match runner::run() {
        Ok(result) => {
            result.analyze();
            if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(2)
        }
    }
}

//! 程序运行函数.

use crate::result::StencilRunResult;
use std::sync::Arc;
use std::time::Instant;
use utils::loader::{self, LoaderError};
use vessel_stencil::observe::LogSink;
use vessel_stencil::pipeline::Pipeline;

/// 实际运行.
pub fn run() -> Result<StencilRunResult, LoaderError> {
    let config = loader::config_from_env_or_home()?;
    log::info!(
        "input: {}, output: {}, distances: {:?}, workers: {}",
        config.input_dir.display(),
        config.output_root.display(),
        config.distances,
        config.workers,
    );

    let pipeline = Pipeline::new(config, Arc::new(LogSink))?;
    let since = Instant::now();
    let batch = pipeline.run()?;
    Ok(StencilRunResult::new(batch, since.elapsed()))
}

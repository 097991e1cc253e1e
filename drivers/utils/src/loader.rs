//! 从环境变量与配置文件加载 [`PipelineConfig`].

use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vessel_stencil::config::PipelineConfig;
use vessel_stencil::StencilError;

/// 配置文件路径. 内容可以是 [`PipelineConfig`], 也可以是 manifest (含 `patients` 字段).
pub const CONFIG_VAR: &str = "STENCIL_CONFIG";

/// 输入目录.
pub const INPUT_DIR_VAR: &str = "STENCIL_INPUT_DIR";

/// 输出根目录.
pub const OUTPUT_DIR_VAR: &str = "STENCIL_OUTPUT_DIR";

/// 逗号分隔的距离列表, 如 `2,3,5`.
pub const DISTANCES_VAR: &str = "STENCIL_DISTANCES";

/// 线程池大小.
pub const WORKERS_VAR: &str = "STENCIL_WORKERS";

/// 配置加载错误.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// 环境变量的值无法解析.
    #[error("cannot parse ${name}=`{value}`")]
    BadVar {
        /// 变量名.
        name: &'static str,
        /// 变量值.
        value: String,
    },

    /// 配置文件不是合法 JSON.
    #[error("malformed config `{path}`")]
    Json {
        /// 配置文件路径.
        path: PathBuf,
        /// 底层错误.
        #[source]
        source: serde_json::Error,
    },

    /// 配置文件读取或解析失败.
    #[error(transparent)]
    Stencil(#[from] StencilError),
}

/// 读取配置文件 `path`. 文件为 manifest 时, 以默认配置为基础并指向该 manifest.
pub fn config_from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, LoaderError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| StencilError::Io {
        path: path.to_owned(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| LoaderError::Json {
            path: path.to_owned(),
            source,
        })?;

    if value.get("patients").is_some() {
        Ok(PipelineConfig {
            manifest: Some(path.to_owned()),
            ..Default::default()
        })
    } else {
        Ok(PipelineConfig::from_json_str(&text)?)
    }
}

/// 由变量查询函数 `var` 构造配置.
///
/// 1. 若 `$STENCIL_CONFIG` 非空, 则以该文件为基础, 否则以默认配置为基础;
/// 2. 其余变量非空时覆盖对应字段.
pub fn config_from_vars<F>(var: F) -> Result<PipelineConfig, LoaderError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match var(CONFIG_VAR) {
        Some(path) => config_from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(d) = var(INPUT_DIR_VAR) {
        config.input_dir = PathBuf::from(d);
    }
    if let Some(d) = var(OUTPUT_DIR_VAR) {
        config.output_root = PathBuf::from(d);
    }
    if let Some(value) = var(DISTANCES_VAR) {
        config.distances = parse_distances(&value).ok_or(LoaderError::BadVar {
            name: DISTANCES_VAR,
            value,
        })?;
    }
    if let Some(value) = var(WORKERS_VAR) {
        config.workers = value
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or(LoaderError::BadVar {
                name: WORKERS_VAR,
                value,
            })?;
    }
    Ok(config)
}

/// 解析逗号分隔的距离列表. 空列表和 NaN 视为无效.
fn parse_distances(s: &str) -> Option<Vec<f64>> {
    let ans = s
        .split(',')
        .map(|t| t.trim().parse::<f64>().ok().filter(|d| !d.is_nan()))
        .collect::<Option<Vec<_>>>()?;
    (!ans.is_empty()).then_some(ans)
}

/// 从环境变量加载配置, 未设置的部分使用 `$HOME/dataset/Vessel_stencils` 下的默认值.
#[inline]
pub fn config_from_env_or_home() -> Result<PipelineConfig, LoaderError> {
    config_from_vars(|name| env::var(name).ok().filter(|v| !v.is_empty()))
}

//! 日志初始化
//!
//! TUI 占用终端，所以日志只写文件：`<data_dir>/hxt.log`。
//! 过滤规则来自 `HXT_LOG` 环境变量，例如 `HXT_LOG=helix_todo=debug`。
use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "hxt.log";
const DEFAULT_FILTER: &str = "helix_todo=info";

/// 初始化全局日志。返回的 guard 必须活到进程结束，否则缓冲的日志会丢失。
pub fn init(data_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(data_dir)?;

    let appender = tracing_appender::rolling::never(data_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_env("HXT_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志失败: {}", e))?;

    Ok(guard)
}

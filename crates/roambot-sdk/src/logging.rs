//! 日志初始化
//!
//! 安装全局 `tracing` fmt subscriber，并把 `log` 记录桥接到 `tracing`。

use thiserror::Error;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::ParseError;

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive: {0}")]
    InvalidDirective(#[from] ParseError),
    #[error("Global subscriber already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("Log bridge already installed: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),
}

/// 构造过滤器：`RUST_LOG` 有效时优先，否则使用 `default_directive`
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_directive)?),
    }
}

/// 初始化全局日志
///
/// 进程内只能成功调用一次，重复调用返回 [`LoggingError::Subscriber`]。
///
/// # Example
///
/// ```no_run
/// roambot_sdk::init_logging("roambot_driver=debug,info").unwrap();
/// ```
pub fn init_logging(default_directive: &str) -> Result<(), LoggingError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive)?)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_parses_directive() {
        assert!(env_filter("roambot_driver=trace,warn").is_ok());
    }

    #[test]
    fn test_init_logging_only_once() {
        // 同一测试进程中第二次安装必然失败
        let first = init_logging("info");
        let second = init_logging("info");
        assert!(first.is_ok() || matches!(first, Err(LoggingError::Subscriber(_))));
        assert!(matches!(second, Err(LoggingError::Subscriber(_))));
    }
}

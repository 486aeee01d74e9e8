//! 日志级别

use kit_common::default_value;
use kit_errors::{AppError, AppResult};
use tracing_subscriber::filter::LevelFilter;

/// 解析日志级别，空字符串为 `info`
///
/// `fatal` 与 `panic` 映射为 `error`。
pub fn parse_level(level: &str) -> AppResult<LevelFilter> {
    let level = default_value(level.trim().to_ascii_lowercase(), "info".to_string());
    match level.as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" | "fatal" | "panic" => Ok(LevelFilter::ERROR),
        "off" | "disabled" => Ok(LevelFilter::OFF),
        other => Err(AppError::config(format!("invalid log level: {}", other))),
    }
}

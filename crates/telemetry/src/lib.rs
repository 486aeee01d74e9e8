//! kit-telemetry - 日志初始化库
//!
//! 根据 [`LogConfig`](kit_config::LogConfig) 构建 tracing 订阅者：本地 JSON/console 输出，
//! 或经 OpenTelemetry 日志导出器批量发送到远端。

mod level;
mod logger;
mod otel;
mod output;

pub use level::parse_level;
pub use logger::{BoxedLayer, LogOptions, Logger, build_logger};
pub use otel::auth_headers;
pub use output::Output;

//! 服务运行时

use kit_common::default_value;
use kit_config::AppConfig;
use kit_errors::AppResult;
use kit_lifecycle::CancellationToken;
use kit_telemetry::{LogOptions, Logger, build_logger};
use tracing::{info, warn};

/// 服务运行时配置
pub struct RuntimeConfig {
    pub config_dir: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            config_dir: "config".to_string(),
        }
    }
}

/// 读取 `.env` 后加载配置
pub fn load_config(runtime: &RuntimeConfig) -> AppResult<AppConfig> {
    dotenvy::dotenv().ok();
    Ok(AppConfig::load(&runtime.config_dir)?)
}

/// 初始化日志并设为全局订阅者
///
/// 未配置 `package_name` 时使用 `app_name`。`shutdown` 取消后刷新日志输出。
/// 已存在全局订阅者时沿用已有的。
pub fn init_runtime(config: &AppConfig, shutdown: CancellationToken) -> AppResult<Logger> {
    let mut log = config.log.clone();
    log.opentelemetry.package_name =
        default_value(log.opentelemetry.package_name, config.app_name.clone());

    let logger = build_logger(&log, LogOptions::new(), shutdown)?;
    if let Err(e) = logger.install_global() {
        warn!(error = %e, "Global logger already installed, keeping existing one");
    }

    info!(
        app_name = %config.app_name,
        app_env = %config.app_env,
        exporting = logger.is_exporting(),
        "Runtime initialized"
    );
    Ok(logger)
}

//! 服务启动器
//!
//! 提供统一的服务启动模式

use std::future::Future;
use std::sync::Arc;

use kit_errors::AppResult;
use kit_lifecycle::{CancellationToken, Lifecycle};
use tracing::{info, warn};

use crate::infrastructure::Infrastructure;
use crate::runtime::{RuntimeConfig, init_runtime, load_config};

/// 运行服务
///
/// 1. 加载 `.env` 与配置目录
/// 2. 初始化日志
/// 3. 创建基础设施并注册停止 hook
/// 4. 调用 `service_builder` 注册服务自身的 hook
/// 5. 执行启动阶段，等待 SIGINT/SIGTERM 后执行停止阶段
///
/// ```ignore
/// use kit_bootstrap::run;
///
/// #[tokio::main]
/// async fn main() {
///     let result = run("config", |infra| async move {
///         infra.lifecycle().append(http_server_hook(infra.mysql_pool()));
///         Ok(())
///     })
///     .await;
///
///     if let Err(e) = result {
///         eprintln!("{}", e);
///         std::process::exit(e.exit_code());
///     }
/// }
/// ```
pub async fn run<F, Fut>(config_dir: &str, service_builder: F) -> AppResult<()>
where
    F: FnOnce(Arc<Infrastructure>) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    let runtime = RuntimeConfig {
        config_dir: config_dir.to_string(),
    };
    let config = load_config(&runtime)?;

    let shutdown = CancellationToken::new();
    let logger = init_runtime(&config, shutdown.clone())?;
    let result = run_with_config(config, shutdown, service_builder).await;

    // 等待日志输出刷新
    if let Err(e) = logger.shutdown().await {
        warn!(error = %e, "Failed to flush logger");
    }
    result
}

async fn run_with_config<F, Fut>(
    config: kit_config::AppConfig,
    shutdown: CancellationToken,
    service_builder: F,
) -> AppResult<()>
where
    F: FnOnce(Arc<Infrastructure>) -> Fut,
    Fut: Future<Output = AppResult<()>>,
{
    info!("Starting {} service", config.app_name);

    let lifecycle = Arc::new(Lifecycle::from_config(&config.lifecycle));

    let prepared = match Infrastructure::from_config(config, lifecycle.clone()).await {
        Ok(infra) => service_builder(Arc::new(infra)).await,
        Err(e) => Err(e),
    };
    if let Err(e) = prepared {
        if let Err(stop_err) = lifecycle.stop(&shutdown).await {
            warn!(error = %stop_err, "Failed to release infrastructure");
        }
        return Err(e);
    }

    lifecycle.run(&shutdown).await?;

    info!("Service stopped");
    Ok(())
}

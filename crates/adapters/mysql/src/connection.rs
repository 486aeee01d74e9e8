//! MySQL 连接管理

use std::time::Duration;

use kit_common::{Handler, apply_handlers, default_value};
use kit_config::DatabaseConfig;
use kit_errors::{AppError, AppResult};
use kit_lifecycle::{Callback, Hook};
use secrecy::ExposeSecret;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::{debug, info};

pub const DEFAULT_CONN_MAX_IDLE_TIME: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CONN_MAX_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 10;
pub const DEFAULT_MAX_OPEN_CONNS: u32 = 100;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// 填充默认值后的连接池参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub max_connections: u32,
    /// 常驻连接数，不超过 `max_connections`
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl PoolSettings {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let max_connections = default_value(config.max_open_conns, DEFAULT_MAX_OPEN_CONNS);
        let max_idle = default_value(config.max_idle_conns, DEFAULT_MAX_IDLE_CONNS);

        Self {
            idle_timeout: default_value(config.conn_max_idle_time, DEFAULT_CONN_MAX_IDLE_TIME),
            max_lifetime: default_value(config.conn_max_lifetime, DEFAULT_CONN_MAX_LIFETIME),
            max_connections,
            min_connections: max_idle.min(max_connections),
            acquire_timeout: default_value(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT),
        }
    }

    fn pool_options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .max_lifetime(self.max_lifetime)
    }
}

/// 创建 MySQL 连接池
///
/// `disable_ping` 为真时连接池惰性建立连接，不做存活检查。
/// handler 在存活检查之前按注册顺序调用。
pub async fn create_pool(
    config: &DatabaseConfig,
    handlers: Vec<Handler<MySqlPool>>,
) -> AppResult<MySqlPool> {
    let dsn = config.dsn.expose_secret();
    if dsn.trim().is_empty() {
        return Err(AppError::config("database dsn is required"));
    }

    let settings = PoolSettings::from_config(config);
    let options = settings.pool_options();

    let pool = if config.disable_ping {
        options.connect_lazy(dsn)
    } else {
        options.connect(dsn).await
    }
    .map_err(|e| AppError::connectivity(format!("Failed to create pool: {}", e)))?;

    apply_handlers(&pool, handlers);

    if !config.disable_ping {
        check_connection(&pool).await?;
    }

    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        lazy = config.disable_ping,
        "MySQL pool ready"
    );
    Ok(pool)
}

/// 检查数据库连接
pub async fn check_connection(pool: &MySqlPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::connectivity(format!("Database health check failed: {}", e)))?;
    Ok(())
}

/// 停止阶段关闭连接池
pub fn mysql_hook(pool: MySqlPool) -> Hook {
    Hook::stop(Callback::infallible(move |_token| {
        let pool = pool.clone();
        async move {
            pool.close().await;
            debug!("MySQL pool closed");
        }
    }))
}

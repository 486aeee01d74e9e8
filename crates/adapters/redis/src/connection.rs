//! Redis 连接管理

use std::sync::Arc;
use std::time::Duration;

use kit_common::{Handler, apply_handlers, default_value};
use kit_config::RedisConfig;
use kit_errors::{AppError, AppResult};
use kit_lifecycle::{Callback, Hook};
use parking_lot::Mutex;
use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use secrecy::ExposeSecret;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// 由配置拼出连接地址
///
/// `addr` 不带协议时按 `redis://` 处理，用户名、密码与库号写入 URL。
pub fn connection_url(config: &RedisConfig) -> AppResult<Url> {
    let addr = default_value(config.addr.trim().to_string(), DEFAULT_ADDR.to_string());
    let raw = if addr.contains("://") {
        addr
    } else {
        format!("redis://{}", addr)
    };

    let mut url = Url::parse(&raw)
        .map_err(|e| AppError::config(format!("invalid redis addr {}: {}", raw, e)))?;

    if !config.username.is_empty() {
        url.set_username(&config.username)
            .map_err(|_| AppError::config("redis addr cannot carry a username"))?;
    }
    let password = config.password.expose_secret();
    if !password.is_empty() {
        url.set_password(Some(password))
            .map_err(|_| AppError::config("redis addr cannot carry a password"))?;
    }
    url.set_path(&format!("/{}", config.db));

    Ok(url)
}

/// 响应超时取读写超时中较大者
pub fn manager_config(config: &RedisConfig) -> ConnectionManagerConfig {
    let read = default_value(config.read_timeout, DEFAULT_READ_TIMEOUT);
    let write = default_value(config.write_timeout, DEFAULT_WRITE_TIMEOUT);

    ConnectionManagerConfig::new()
        .set_response_timeout(read.max(write))
        .set_connection_timeout(default_value(config.dial_timeout, DEFAULT_DIAL_TIMEOUT))
}

/// 创建 Redis 连接管理器
///
/// 连接管理器创建时即建立连接并在断线后自动重连；
/// `disable_ping` 只跳过之后的 PING 检查。
pub async fn create_connection_manager(
    config: &RedisConfig,
    handlers: Vec<Handler<ConnectionManager>>,
) -> AppResult<ConnectionManager> {
    let url = connection_url(config)?;
    let client = Client::open(url.as_str())
        .map_err(|e| AppError::connectivity(format!("Failed to create Redis client: {}", e)))?;

    let manager = ConnectionManager::new_with_config(client, manager_config(config))
        .await
        .map_err(|e| {
            AppError::connectivity(format!("Failed to create Redis connection manager: {}", e))
        })?;

    apply_handlers(&manager, handlers);

    if !config.disable_ping {
        let mut conn = manager.clone();
        check_connection(&mut conn).await?;
    }

    info!(
        host = url.host_str().unwrap_or_default(),
        db = config.db,
        "Redis connection ready"
    );
    Ok(manager)
}

/// 检查 Redis 连接
pub async fn check_connection(conn: &mut ConnectionManager) -> AppResult<()> {
    redis::cmd("PING")
        .query_async::<String>(conn)
        .await
        .map_err(|e| AppError::connectivity(format!("Redis health check failed: {}", e)))?;
    Ok(())
}

/// 停止阶段释放连接管理器
///
/// 其余克隆仍可继续使用，连接在最后一个克隆释放时关闭。
pub fn redis_hook(manager: ConnectionManager) -> Hook {
    let slot = Arc::new(Mutex::new(Some(manager)));
    Hook::stop(Callback::infallible(move |_token| {
        let released = slot.lock().take();
        async move {
            if released.is_some() {
                drop(released);
                debug!("Redis connection manager released");
            }
        }
    }))
}

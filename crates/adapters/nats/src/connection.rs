//! NATS 连接管理

use std::time::Duration;

use async_nats::{Client, ConnectOptions, ServerAddr};
use kit_common::{Handler, apply_handlers, default_value};
use kit_config::NatsConfig;
use kit_errors::{AppError, AppResult};
use kit_lifecycle::{Callback, Hook, HookError};
use tracing::{debug, info};

pub const DEFAULT_URL: &str = "nats://127.0.0.1:4222";
pub const DEFAULT_MAX_RECONNECTS: usize = 5;
pub const DEFAULT_RECONNECT_WAIT: Duration = Duration::from_millis(100);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// 在默认连接选项之上追加的定制，例如认证、TLS
pub type OptionFn = Box<dyn FnOnce(ConnectOptions) -> ConnectOptions + Send + 'static>;

/// 解析逗号分隔的服务器地址，空字符串使用默认地址
pub fn server_addrs(config: &NatsConfig) -> AppResult<Vec<ServerAddr>> {
    let url = default_value(config.url.trim().to_string(), DEFAULT_URL.to_string());
    url.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| {
            addr.parse::<ServerAddr>()
                .map_err(|e| AppError::config(format!("invalid nats url {}: {}", addr, e)))
        })
        .collect()
}

/// 默认连接选项
pub fn connect_options(config: &NatsConfig) -> ConnectOptions {
    let reconnect_wait = default_value(config.reconnect_wait, DEFAULT_RECONNECT_WAIT);

    let mut options = ConnectOptions::new()
        .connection_timeout(default_value(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT))
        .max_reconnects(default_value(config.max_reconnects, DEFAULT_MAX_RECONNECTS))
        .reconnect_delay_callback(move |_attempts| reconnect_wait);

    if !config.name.is_empty() {
        options = options.name(&config.name);
    }
    options
}

/// 连接 NATS
///
/// `options` 依次作用在默认选项之上，handler 在连接建立后按注册顺序调用。
pub async fn connect(
    config: &NatsConfig,
    options: Vec<OptionFn>,
    handlers: Vec<Handler<Client>>,
) -> AppResult<Client> {
    let addrs = server_addrs(config)?;
    let connect_options = options
        .into_iter()
        .fold(connect_options(config), |acc, customize| customize(acc));

    let client = connect_options
        .connect(addrs.as_slice())
        .await
        .map_err(|e| AppError::connectivity(format!("Failed to connect to NATS: {}", e)))?;

    apply_handlers(&client, handlers);

    if !config.disable_ping {
        check_connection(&client).await?;
    }

    info!(servers = addrs.len(), "NATS connection ready");
    Ok(client)
}

/// 往返一次服务器确认连接可用
pub async fn check_connection(client: &Client) -> AppResult<()> {
    client
        .flush()
        .await
        .map_err(|e| AppError::connectivity(format!("NATS health check failed: {}", e)))
}

/// 停止阶段把缓冲中的消息刷到服务器
pub fn nats_hook(client: Client) -> Hook {
    Hook::stop(Callback::fallible(move |_token| {
        let client = client.clone();
        async move {
            client.flush().await.map_err(HookError::from)?;
            debug!("NATS client flushed");
            Ok(())
        }
    }))
}

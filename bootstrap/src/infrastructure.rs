//! 基础设施资源管理
//!
//! 按配置创建数据库、缓存与消息总线客户端，并把释放动作注册到生命周期

use std::sync::Arc;

use kit_adapter_mysql::{MySqlPool, create_pool, mysql_hook};
use kit_adapter_nats::{Client as NatsClient, connect, nats_hook};
use kit_adapter_redis::{ConnectionManager, create_connection_manager, redis_hook};
use kit_config::AppConfig;
use kit_errors::AppResult;
use kit_lifecycle::Lifecycle;
use tracing::info;

/// 基础设施资源容器
///
/// 配置中缺省的段对应的客户端为 `None`
pub struct Infrastructure {
    /// 应用配置
    config: AppConfig,
    lifecycle: Arc<Lifecycle>,
    mysql_pool: Option<MySqlPool>,
    redis_conn: Option<ConnectionManager>,
    nats_client: Option<NatsClient>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源
    ///
    /// 每个客户端创建成功后立即注册停止 hook；中途失败时已创建的客户端
    /// 由调用方执行 `lifecycle.stop` 释放。
    pub async fn from_config(config: AppConfig, lifecycle: Arc<Lifecycle>) -> AppResult<Self> {
        let mysql_pool = match &config.database {
            Some(database) => {
                let pool = create_pool(database, Vec::new()).await?;
                lifecycle.append(mysql_hook(pool.clone()));
                Some(pool)
            }
            None => {
                info!("Database not configured, skipping");
                None
            }
        };

        let redis_conn = match &config.redis {
            Some(redis) => {
                let conn = create_connection_manager(redis, Vec::new()).await?;
                lifecycle.append(redis_hook(conn.clone()));
                Some(conn)
            }
            None => {
                info!("Redis not configured, skipping");
                None
            }
        };

        let nats_client = match &config.nats {
            Some(nats) => {
                let client = connect(nats, Vec::new(), Vec::new()).await?;
                lifecycle.append(nats_hook(client.clone()));
                Some(client)
            }
            None => {
                info!("NATS not configured, skipping");
                None
            }
        };

        Ok(Self {
            config,
            lifecycle,
            mysql_pool,
            redis_conn,
            nats_client,
        })
    }

    /// 获取应用配置
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 服务自身的启动/停止 hook 也注册到这里
    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        self.lifecycle.clone()
    }

    pub fn mysql_pool(&self) -> Option<MySqlPool> {
        self.mysql_pool.clone()
    }

    pub fn redis_connection_manager(&self) -> Option<ConnectionManager> {
        self.redis_conn.clone()
    }

    pub fn nats_client(&self) -> Option<NatsClient> {
        self.nats_client.clone()
    }

    pub fn has_mysql(&self) -> bool {
        self.mysql_pool.is_some()
    }

    pub fn has_redis(&self) -> bool {
        self.redis_conn.is_some()
    }

    pub fn has_nats(&self) -> bool {
        self.nats_client.is_some()
    }
}

//! kit-errors - 统一错误处理
//!
//! 启动阶段的错误分类：配置、连通性、生命周期、遥测

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 必填项缺失、配置源加载失败或解码失败
    #[error("Config error: {0}")]
    Config(String),

    /// 驱动连接失败或存活检查失败
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// 启动/停止 hook 失败或阶段超时
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// 日志与导出管道构建失败
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn connectivity(msg: impl Into<String>) -> Self {
        Self::Connectivity(msg.into())
    }

    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::Lifecycle(msg.into())
    }

    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry(msg.into())
    }

    /// 是否为配置错误
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// 是否为连通性错误
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity(_))
    }

    /// 进程退出码，启动失败时由调用方使用
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 78,
            Self::Connectivity(_) => 69,
            Self::Lifecycle(_) => 70,
            Self::Telemetry(_) => 74,
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

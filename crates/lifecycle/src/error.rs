//! 生命周期错误类型

use std::fmt;
use std::time::Duration;

use kit_errors::AppError;
use thiserror::Error;

use crate::hook::HookError;
use crate::runner::State;

/// 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Stop => f.write_str("stop"),
        }
    }
}

/// [`Lifecycle::start`](crate::Lifecycle::start) / [`Lifecycle::stop`](crate::Lifecycle::stop) 返回的错误
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// 某个 hook 返回失败；同阶段其他失败放在 `suppressed` 中
    #[error("{source}")]
    Hook {
        phase: Phase,
        source: HookError,
        suppressed: Vec<HookError>,
    },

    /// 阶段超时，令牌已取消；取消后才返回的失败放在 `suppressed` 中
    #[error("{phase} phase timed out after {timeout:?}")]
    Timeout {
        phase: Phase,
        timeout: Duration,
        suppressed: Vec<HookError>,
    },

    /// hook 任务 panic
    #[error("{phase} hook panicked")]
    Panicked { phase: Phase },

    /// 当前状态不允许进入该阶段
    #[error("cannot {phase} lifecycle in state {state}")]
    InvalidState { phase: Phase, state: State },

    /// 信号处理器安装失败
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

impl LifecycleError {
    /// 出错的阶段（信号错误没有阶段）
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Hook { phase, .. }
            | Self::Timeout { phase, .. }
            | Self::Panicked { phase }
            | Self::InvalidState { phase, .. } => Some(*phase),
            Self::Signal(_) => None,
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        match err.phase() {
            Some(phase) => AppError::lifecycle(format!("{} phase: {}", phase, err)),
            None => AppError::lifecycle(err.to_string()),
        }
    }
}

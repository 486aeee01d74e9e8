//! Hook 与回调

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Hook 返回的错误
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult = Result<(), HookError>;

type CallbackFn = dyn Fn(CancellationToken) -> BoxFuture<'static, HookResult> + Send + Sync;

/// 统一形状的 hook 回调：接收阶段的取消令牌，返回成功或失败
///
/// 回调必须响应令牌取消，阶段超时后只会取消令牌并等待回调返回。
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    /// 可能失败的回调
    pub fn fallible<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self(Arc::new(
            move |token: CancellationToken| -> BoxFuture<'static, HookResult> { Box::pin(f(token)) },
        ))
    }

    /// 不会失败的回调，完成即视为成功
    pub fn infallible<F, Fut>(f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(
            move |token: CancellationToken| -> BoxFuture<'static, HookResult> {
                let fut = f(token);
                Box::pin(async move {
                    fut.await;
                    Ok(())
                })
            },
        ))
    }

    pub(crate) fn call(&self, token: CancellationToken) -> BoxFuture<'static, HookResult> {
        (self.0)(token)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// 一对可选的启动/停止回调
///
/// 两者都为空时注册没有任何效果。
#[derive(Debug, Clone, Default)]
pub struct Hook {
    pub on_start: Option<Callback>,
    pub on_stop: Option<Callback>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只有启动回调的 hook
    pub fn start(callback: Callback) -> Self {
        Self::new().with_start(callback)
    }

    /// 只有停止回调的 hook
    pub fn stop(callback: Callback) -> Self {
        Self::new().with_stop(callback)
    }

    pub fn with_start(mut self, callback: Callback) -> Self {
        self.on_start = Some(callback);
        self
    }

    pub fn with_stop(mut self, callback: Callback) -> Self {
        self.on_stop = Some(callback);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_start.is_none() && self.on_stop.is_none()
    }
}

/// 组件注册 hook 的入口
pub trait HookRegistry: Send + Sync {
    fn append(&self, hook: Hook);
}

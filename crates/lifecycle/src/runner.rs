//! 生命周期执行器

use std::fmt;
use std::future::Future;
use std::time::Duration;

use kit_common::default_value;
use kit_config::LifecycleConfig;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LifecycleError, Phase};
use crate::hook::{Callback, Hook, HookError, HookRegistry};
use crate::signals::shutdown_signal;

/// 每个阶段的默认超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(6);

/// 生命周期状态
///
/// `Idle → Starting → Running → Stopping → Stopped`，启动失败进入 `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Idle => "idle",
            State::Starting => "starting",
            State::Running => "running",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
            State::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct Inner {
    start_hooks: Vec<Callback>,
    stop_hooks: Vec<Callback>,
    state: State,
}

/// 生命周期执行器
///
/// 每个阶段执行开始时复制一份回调列表，阶段进行中追加的 hook 只影响之后的阶段。
pub struct Lifecycle {
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// 指定阶段超时，零值使用 [`DEFAULT_TIMEOUT`]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: default_value(timeout, DEFAULT_TIMEOUT),
            inner: Mutex::new(Inner {
                start_hooks: Vec::new(),
                stop_hooks: Vec::new(),
                state: State::Idle,
            }),
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::with_timeout(config.timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// 已注册的 (启动, 停止) 回调数量
    pub fn hook_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.start_hooks.len(), inner.stop_hooks.len())
    }

    /// 注册 hook，空的回调被忽略
    pub fn append(&self, hook: Hook) {
        let mut inner = self.inner.lock();
        if let Some(on_start) = hook.on_start {
            inner.start_hooks.push(on_start);
        }
        if let Some(on_stop) = hook.on_stop {
            inner.stop_hooks.push(on_stop);
        }
    }

    /// 并发执行所有启动回调
    ///
    /// 仅允许在 `Idle` 状态调用。任意回调失败或超时都会返回错误。
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), LifecycleError> {
        self.run_phase(Phase::Start, parent).await
    }

    /// 并发执行所有停止回调，使用新的超时
    pub async fn stop(&self, parent: &CancellationToken) -> Result<(), LifecycleError> {
        self.run_phase(Phase::Stop, parent).await
    }

    /// 阻塞直到收到 SIGINT/SIGTERM，然后执行停止阶段
    ///
    /// 等待本身没有超时。
    pub async fn wait_stop(&self, parent: &CancellationToken) -> Result<(), LifecycleError> {
        shutdown_signal().await?;
        self.stop(parent).await
    }

    /// `signal` 完成后执行停止阶段
    pub async fn stop_on<F>(&self, signal: F, parent: &CancellationToken) -> Result<(), LifecycleError>
    where
        F: Future<Output = ()>,
    {
        signal.await;
        self.stop(parent).await
    }

    /// 启动，等待信号，停止
    ///
    /// 启动失败时先执行停止阶段释放已启动的组件，再返回启动错误；
    /// 状态不允许启动时直接返回，不执行停止阶段。
    pub async fn run(&self, parent: &CancellationToken) -> Result<(), LifecycleError> {
        if let Err(err) = self.start(parent).await {
            // 启动阶段未执行时不触碰已在运行的组件
            if matches!(err, LifecycleError::InvalidState { .. }) {
                return Err(err);
            }
            if let Err(stop_err) = self.stop(parent).await {
                warn!(error = %stop_err, "Lifecycle stop after failed start also failed");
            }
            return Err(err);
        }
        self.wait_stop(parent).await
    }

    async fn run_phase(&self, phase: Phase, parent: &CancellationToken) -> Result<(), LifecycleError> {
        let callbacks = self.begin(phase)?;

        info!(
            phase = %phase,
            hooks = callbacks.len(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Lifecycle phase starting"
        );

        let result = dispatch(phase, callbacks, parent.child_token(), self.timeout).await;
        self.finish(phase, result.is_ok());

        if result.is_ok() {
            info!(phase = %phase, "Lifecycle phase completed");
        }
        result
    }

    fn begin(&self, phase: Phase) -> Result<Vec<Callback>, LifecycleError> {
        let mut inner = self.inner.lock();

        let allowed = match phase {
            Phase::Start => inner.state == State::Idle,
            Phase::Stop => matches!(inner.state, State::Idle | State::Running | State::Failed),
        };
        if !allowed {
            return Err(LifecycleError::InvalidState {
                phase,
                state: inner.state,
            });
        }

        let callbacks = match phase {
            Phase::Start => {
                inner.state = State::Starting;
                inner.start_hooks.clone()
            }
            Phase::Stop => {
                inner.state = State::Stopping;
                inner.stop_hooks.clone()
            }
        };
        Ok(callbacks)
    }

    fn finish(&self, phase: Phase, ok: bool) {
        let mut inner = self.inner.lock();
        inner.state = match (phase, ok) {
            (Phase::Start, true) => State::Running,
            (Phase::Start, false) => State::Failed,
            (Phase::Stop, _) => State::Stopped,
        };
    }
}

impl HookRegistry for Lifecycle {
    fn append(&self, hook: Hook) {
        Lifecycle::append(self, hook);
    }
}

/// 每个回调一个任务；超时后取消令牌并等待所有任务返回
async fn dispatch(
    phase: Phase,
    callbacks: Vec<Callback>,
    token: CancellationToken,
    timeout: Duration,
) -> Result<(), LifecycleError> {
    let mut tasks = JoinSet::new();
    for callback in callbacks {
        let token = token.clone();
        tasks.spawn(async move { callback.call(token).await });
    }

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut failures: Vec<HookError> = Vec::new();
    let mut late_failures: Vec<HookError> = Vec::new();
    let mut panicked = false;
    let mut timed_out = false;

    while !tasks.is_empty() {
        tokio::select! {
            biased;

            Some(joined) = tasks.join_next() => match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) if timed_out => late_failures.push(err),
                Ok(Err(err)) => failures.push(err),
                Err(err) => panicked |= err.is_panic(),
            },
            _ = &mut deadline, if !timed_out => {
                debug!(phase = %phase, pending = tasks.len(), "Lifecycle phase deadline reached, cancelling hooks");
                timed_out = true;
                token.cancel();
            }
            else => break,
        }
    }
    token.cancel();

    // 超时后返回的错误多半由取消引起，只作为附带信息
    if !failures.is_empty() {
        let source = failures.remove(0);
        failures.append(&mut late_failures);
        return Err(LifecycleError::Hook {
            phase,
            source,
            suppressed: failures,
        });
    }
    if panicked {
        return Err(LifecycleError::Panicked { phase });
    }
    if timed_out {
        return Err(LifecycleError::Timeout {
            phase,
            timeout,
            suppressed: late_failures,
        });
    }
    Ok(())
}

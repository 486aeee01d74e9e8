//! kit-lifecycle - 应用生命周期
//!
//! 组件通过 [`HookRegistry::append`] 注册启动/停止 hook；[`Lifecycle`] 在每个阶段
//! 并发执行全部 hook，统一受超时约束，并可阻塞等待 SIGINT/SIGTERM 后进入停止阶段。

mod error;
mod hook;
mod runner;
mod signals;

pub use error::{LifecycleError, Phase};
pub use hook::{Callback, Hook, HookError, HookRegistry, HookResult};
pub use runner::{DEFAULT_TIMEOUT, Lifecycle, State};
pub use signals::shutdown_signal;
pub use tokio_util::sync::CancellationToken;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use kit_lifecycle::{
    Callback, CancellationToken, Hook, HookError, HookRegistry, Lifecycle, LifecycleError, Phase,
    State,
};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn counting(counter: Arc<AtomicUsize>) -> Callback {
    Callback::infallible(move |_token| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    })
}

fn failing(message: &'static str) -> Callback {
    Callback::fallible(move |_token| async move { Err(HookError::from(message)) })
}

/// 等待令牌取消，被取消时记录下来
fn waits_for_cancel(observed: Arc<AtomicBool>) -> Callback {
    Callback::fallible(move |token: CancellationToken| {
        let observed = observed.clone();
        async move {
            tokio::select! {
                _ = token.cancelled() => {
                    observed.store(true, Ordering::SeqCst);
                    Ok(())
                }
                _ = tokio::time::sleep(Duration::from_secs(60)) => Ok(()),
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Start phase
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_start_hooks_run_exactly_once() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let counters: Vec<_> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for counter in &counters {
        lifecycle.append(Hook::start(counting(counter.clone())));
    }

    lifecycle.start(&CancellationToken::new()).await.unwrap();

    for counter in &counters {
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
    assert_eq!(lifecycle.state(), State::Running);
}

#[tokio::test]
async fn failing_start_hook_is_surfaced() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let ran = Arc::new(AtomicUsize::new(0));
    lifecycle.append(Hook::start(counting(ran.clone())));
    lifecycle.append(Hook::start(failing("port already in use")));
    lifecycle.append(Hook::start(counting(ran.clone())));

    let err = lifecycle.start(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.to_string(), "port already in use");
    assert_eq!(err.phase(), Some(Phase::Start));
    assert_eq!(ran.load(Ordering::SeqCst), 2);
    assert_eq!(lifecycle.state(), State::Failed);
}

#[tokio::test]
async fn multiple_failures_report_one_and_keep_the_rest() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    lifecycle.append(Hook::start(failing("a")));
    lifecycle.append(Hook::start(failing("b")));

    match lifecycle.start(&CancellationToken::new()).await {
        Err(LifecycleError::Hook {
            phase,
            source,
            suppressed,
        }) => {
            assert_eq!(phase, Phase::Start);
            assert!(["a", "b"].contains(&source.to_string().as_str()));
            assert_eq!(suppressed.len(), 1);
            assert_ne!(suppressed[0].to_string(), source.to_string());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn blocked_hook_times_out_and_sees_cancellation() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_millis(50));
    let observed = Arc::new(AtomicBool::new(false));
    lifecycle.append(Hook::start(waits_for_cancel(observed.clone())));

    let began = Instant::now();
    let err = lifecycle.start(&CancellationToken::new()).await.unwrap_err();

    assert!(began.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        err,
        LifecycleError::Timeout {
            phase: Phase::Start,
            ..
        }
    ));
    assert!(observed.load(Ordering::SeqCst));
    assert_eq!(lifecycle.state(), State::Failed);
}

#[tokio::test]
async fn failure_after_timeout_is_kept_as_suppressed() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_millis(50));
    lifecycle.append(Hook::start(Callback::fallible(|token: CancellationToken| async move {
        token.cancelled().await;
        Err(HookError::from("socket closed mid-handshake"))
    })));

    let err = lifecycle.start(&CancellationToken::new()).await.unwrap_err();

    match err {
        LifecycleError::Timeout {
            phase, suppressed, ..
        } => {
            assert_eq!(phase, Phase::Start);
            assert_eq!(suppressed.len(), 1);
            assert_eq!(suppressed[0].to_string(), "socket closed mid-handshake");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(lifecycle.state(), State::Failed);
}

#[tokio::test]
async fn panicking_hook_is_reported() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    lifecycle.append(Hook::start(Callback::infallible(|_token| async {
        panic!("hook exploded");
    })));

    let err = lifecycle.start(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Panicked { phase: Phase::Start }));
}

#[tokio::test]
async fn parent_cancellation_reaches_hooks() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(5));
    let observed = Arc::new(AtomicBool::new(false));
    lifecycle.append(Hook::start(waits_for_cancel(observed.clone())));

    let parent = CancellationToken::new();
    parent.cancel();

    lifecycle.start(&parent).await.unwrap();
    assert!(observed.load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_hook_is_a_noop() {
    let lifecycle = Lifecycle::new();
    lifecycle.append(Hook::new());
    assert_eq!(lifecycle.hook_counts(), (0, 0));

    lifecycle.start(&CancellationToken::new()).await.unwrap();
    lifecycle.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(lifecycle.state(), State::Stopped);
}

#[tokio::test]
async fn hook_with_both_callbacks_lands_in_both_lists() {
    let lifecycle = Lifecycle::new();
    let noop = Callback::infallible(|_| async {});
    lifecycle.append(Hook::start(noop.clone()).with_stop(noop));
    assert_eq!(lifecycle.hook_counts(), (1, 1));
}

#[tokio::test]
async fn append_during_phase_does_not_join_that_phase() {
    let lifecycle = Arc::new(Lifecycle::with_timeout(Duration::from_secs(1)));
    let late_runs = Arc::new(AtomicUsize::new(0));

    let registry = lifecycle.clone();
    let late = counting(late_runs.clone());
    lifecycle.append(Hook::start(Callback::infallible(move |_token| {
        let registry = registry.clone();
        let late = late.clone();
        async move {
            HookRegistry::append(registry.as_ref(), Hook::start(late));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })));

    lifecycle.start(&CancellationToken::new()).await.unwrap();

    assert_eq!(late_runs.load(Ordering::SeqCst), 0);
    assert_eq!(lifecycle.hook_counts(), (2, 0));
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_twice_is_rejected() {
    let lifecycle = Lifecycle::new();
    lifecycle.start(&CancellationToken::new()).await.unwrap();

    let err = lifecycle.start(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            phase: Phase::Start,
            state: State::Running,
        }
    ));
}

#[tokio::test]
async fn stop_is_terminal() {
    let lifecycle = Lifecycle::new();
    lifecycle.stop(&CancellationToken::new()).await.unwrap();

    assert!(lifecycle.start(&CancellationToken::new()).await.is_err());
    let err = lifecycle.stop(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "cannot stop lifecycle in state stopped");
}

#[tokio::test]
async fn stop_is_allowed_after_failed_start() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let stopped = Arc::new(AtomicUsize::new(0));
    lifecycle.append(Hook::start(failing("boom")).with_stop(counting(stopped.clone())));

    assert!(lifecycle.start(&CancellationToken::new()).await.is_err());
    lifecycle.stop(&CancellationToken::new()).await.unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_timeout_uses_default() {
    assert_eq!(Lifecycle::with_timeout(Duration::ZERO).timeout(), kit_lifecycle::DEFAULT_TIMEOUT);

    let config = kit_config::LifecycleConfig {
        timeout: Duration::from_millis(250),
    };
    assert_eq!(Lifecycle::from_config(&config).timeout(), Duration::from_millis(250));
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_on_runs_stop_hooks_after_signal() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let stopped = Arc::new(AtomicUsize::new(0));
    lifecycle.append(Hook::stop(counting(stopped.clone())));
    lifecycle.start(&CancellationToken::new()).await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tx.send(()).unwrap();

    lifecycle
        .stop_on(
            async {
                let _ = rx.await;
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.state(), State::Stopped);
}

#[tokio::test]
async fn run_releases_hooks_when_start_fails() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let released = Arc::new(AtomicUsize::new(0));
    lifecycle.append(Hook::stop(counting(released.clone())));
    lifecycle.append(Hook::start(failing("database unreachable")));

    let err = lifecycle.run(&CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.to_string(), "database unreachable");
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.state(), State::Stopped);
}

#[tokio::test]
async fn run_on_running_lifecycle_leaves_components_alone() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    let stopped = Arc::new(AtomicUsize::new(0));
    lifecycle.append(Hook::stop(counting(stopped.clone())));
    let token = CancellationToken::new();
    lifecycle.start(&token).await.unwrap();

    let err = lifecycle.run(&token).await.unwrap_err();

    assert!(matches!(err, LifecycleError::InvalidState { .. }));
    assert_eq!(stopped.load(Ordering::SeqCst), 0);
    assert_eq!(lifecycle.state(), State::Running);
}

#[tokio::test]
async fn lifecycle_error_converts_to_app_error() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_secs(1));
    lifecycle.append(Hook::start(failing("boom")));

    let err: kit_errors::AppError = lifecycle
        .start(&CancellationToken::new())
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.to_string(), "Lifecycle error: start phase: boom");
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_then_stop_end_to_end() {
    let lifecycle = Lifecycle::with_timeout(Duration::from_millis(50));
    let slow = Arc::new(AtomicUsize::new(0));
    let fast = Arc::new(AtomicUsize::new(0));

    let slow_counter = slow.clone();
    lifecycle.append(Hook::start(Callback::fallible(move |_token| {
        let slow = slow_counter.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            slow.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })));
    lifecycle.append(Hook::start(counting(fast.clone())));

    lifecycle.start(&CancellationToken::new()).await.unwrap();
    assert_eq!(slow.load(Ordering::SeqCst), 1);
    assert_eq!(fast.load(Ordering::SeqCst), 1);

    lifecycle.append(Hook::stop(failing("disk full")));
    let err = lifecycle.stop(&CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "disk full");
}

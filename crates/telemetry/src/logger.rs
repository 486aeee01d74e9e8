//! 日志构建

use std::sync::Arc;

use kit_config::LogConfig;
use kit_errors::{AppError, AppResult};
use opentelemetry::KeyValue;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_sdk::logs::LoggerProvider;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, warn};
use tracing::dispatcher::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, MakeWriter, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Layer, Registry};

use crate::level::parse_level;
use crate::otel::build_provider;
use crate::output::Output;

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// 构建选项
///
/// 覆盖配置中的输出、提供自定义 LoggerProvider 或附加 layer。
#[derive(Default)]
pub struct LogOptions {
    writer: Option<BoxMakeWriter>,
    provider: Option<LoggerProvider>,
    layers: Vec<BoxedLayer>,
    attributes: Vec<KeyValue>,
}

impl LogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 替代 `output` 配置的写入目标
    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.writer = Some(BoxMakeWriter::new(writer));
        self
    }

    /// 使用调用方的 LoggerProvider，不再按配置创建导出器
    ///
    /// 调用方负责关闭该 provider。
    pub fn with_provider(mut self, provider: LoggerProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// 附加 layer，与本地输出共用同一级别过滤
    pub fn with_layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Registry> + Send + Sync + 'static,
    {
        self.layers.push(Box::new(layer));
        self
    }

    /// 额外的资源属性，附加在 `service.name` 之后
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        self.attributes.extend(attributes);
        self
    }
}

/// 已构建的日志
///
/// 构建时不修改全局状态，调用 [`Logger::install_global`] 后才成为进程默认订阅者。
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    level: LevelFilter,
    exporting: bool,
    shutdown: CancellationToken,
    release: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Logger {
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// 是否经 OpenTelemetry 导出
    pub fn is_exporting(&self) -> bool {
        self.exporting
    }

    /// 设置为全局订阅者，只能成功一次
    pub fn install_global(&self) -> AppResult<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| AppError::telemetry(format!("Failed to install logger: {}", e)))
    }

    /// 当前线程内作为默认订阅者，guard 释放后恢复
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// 取消 `shutdown` 令牌并等待文件写入刷新、导出器关闭
    ///
    /// 多个克隆中只有第一次调用会等待，之后立即返回。
    pub async fn shutdown(&self) -> AppResult<()> {
        self.shutdown.cancel();
        let release = self.release.lock().take();
        match release {
            Some(handle) => handle
                .await
                .map_err(|e| AppError::telemetry(format!("Logger release task failed: {}", e))),
            None => Ok(()),
        }
    }
}

/// 根据配置构建日志
///
/// - 启用 OpenTelemetry 时所有记录经导出器发送，本地输出被忽略
/// - 否则按 `format` 输出 JSON 或 console 格式到 `output`
///
/// `shutdown` 被取消后刷新文件写入并关闭自建的导出器，[`Logger::shutdown`] 等待该过程完成。
/// 必须在 tokio 运行时内调用。
pub fn build_logger(
    config: &LogConfig,
    options: LogOptions,
    shutdown: CancellationToken,
) -> AppResult<Logger> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|_| AppError::telemetry("logger must be built inside a tokio runtime"))?;
    let level = parse_level(&config.level)?;

    let LogOptions {
        writer,
        provider,
        layers: extra,
        attributes,
    } = options;

    let mut guard: Option<WorkerGuard> = None;
    let mut owned_provider: Option<LoggerProvider> = None;
    let mut layers: Vec<BoxedLayer> = Vec::with_capacity(extra.len() + 1);

    let exporting = config.opentelemetry.enabled;
    if exporting {
        let provider = match provider {
            Some(provider) => provider,
            None => {
                let provider = build_provider(&config.opentelemetry, attributes)?;
                owned_provider = Some(provider.clone());
                provider
            }
        };
        layers.push(
            OpenTelemetryTracingBridge::new(&provider)
                .with_filter(level)
                .boxed(),
        );
    } else {
        let output = Output::parse(&config.output);
        let writer = match writer {
            Some(writer) => writer,
            None => {
                let (writer, file_guard) = output.make_writer()?;
                guard = file_guard;
                writer
            }
        };
        let ansi = !config.no_color && output.is_terminal();
        layers.push(
            format_layer(&config.format, writer, ansi)
                .with_filter(level)
                .boxed(),
        );
    }

    for layer in extra {
        layers.push(layer.with_filter(level).boxed());
    }

    let dispatch = Dispatch::new(Registry::default().with(layers));

    let release = runtime.spawn(release_on_shutdown(shutdown.clone(), guard, owned_provider));

    Ok(Logger {
        dispatch,
        level,
        exporting,
        shutdown,
        release: Arc::new(Mutex::new(Some(release))),
    })
}

/// `console` 输出可读文本，其余一律 JSON
fn format_layer(format: &str, writer: BoxMakeWriter, ansi: bool) -> BoxedLayer {
    if format.trim().eq_ignore_ascii_case("console") {
        fmt::layer().with_writer(writer).with_ansi(ansi).boxed()
    } else {
        fmt::layer().json().with_writer(writer).with_ansi(false).boxed()
    }
}

async fn release_on_shutdown(
    shutdown: CancellationToken,
    guard: Option<WorkerGuard>,
    provider: Option<LoggerProvider>,
) {
    shutdown.cancelled().await;
    drop(guard);

    if let Some(provider) = provider {
        // shutdown 会阻塞等待批处理任务刷新
        match tokio::task::spawn_blocking(move || provider.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "OpenTelemetry logger provider shutdown failed"),
            Err(e) => warn!(error = %e, "OpenTelemetry logger provider shutdown task failed"),
        }
    }
}

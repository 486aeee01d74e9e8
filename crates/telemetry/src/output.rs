//! 日志输出目标

use std::path::{Path, PathBuf};

use kit_errors::{AppError, AppResult};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// 输出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl Output {
    /// `stdout`（默认，含空字符串）、`stderr`，其余视为文件路径
    pub fn parse(output: &str) -> Self {
        let trimmed = output.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "stdout" => Output::Stdout,
            "stderr" => Output::Stderr,
            _ => Output::File(PathBuf::from(trimmed)),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Output::File(_))
    }

    /// 文件输出使用后台线程写入，返回的 guard 被 drop 时刷新并关闭
    pub(crate) fn make_writer(&self) -> AppResult<(BoxMakeWriter, Option<WorkerGuard>)> {
        match self {
            Output::Stdout => Ok((BoxMakeWriter::new(std::io::stdout), None)),
            Output::Stderr => Ok((BoxMakeWriter::new(std::io::stderr), None)),
            Output::File(path) => {
                let appender = file_appender(path)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                Ok((BoxMakeWriter::new(writer), Some(guard)))
            }
        }
    }
}

fn file_appender(path: &Path) -> AppResult<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::config(format!("invalid log file path: {}", path.display())))?;
    let directory = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .map_err(|e| AppError::telemetry(format!("failed to open log file {}: {}", path.display(), e)))
}

//! 单次运行的日志：写入固定路径的文件，同时转发到 tracing。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use svgsketch_io::IoError;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Status,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// 运行日志。每行写入后立即刷新；值被丢弃时文件随之关闭。
///
/// 只有 [`RunLog::in_memory`] 保留逐行记录。
#[derive(Debug)]
pub struct RunLog {
    path: Option<PathBuf>,
    sink: Option<BufWriter<File>>,
    transcript: Option<Vec<LogLine>>,
}

impl RunLog {
    /// 创建（截断）日志文件。
    pub fn create(path: &Path) -> Result<Self, IoError> {
        let file = File::create(path).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            sink: Some(BufWriter::new(file)),
            transcript: None,
        })
    }

    /// 只保留内存记录，不写文件。
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sink: None,
            transcript: Some(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn status(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.push(LogLevel::Status, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.push(LogLevel::Error, message);
    }

    /// 文件日志返回空切片。
    pub fn lines(&self) -> &[LogLine] {
        self.transcript.as_deref().unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.message.contains(needle))
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if let Some(sink) = self.sink.as_mut() {
            let written = writeln!(sink, "{message}").and_then(|_| sink.flush());
            if let Err(err) = written {
                warn!(error = %err, "写入运行日志失败，后续仅输出到控制台");
                self.sink = None;
            }
        }
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.push(LogLine { level, message });
        }
    }
}

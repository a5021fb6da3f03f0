//! Per-call log files.
//!
//! Each call writes to its own append-only file under the logs directory,
//! named `call_<YYYYmmdd_HHMMSS>_<StreamSID>.log`. Lines are formatted as
//! `<timestamp> - <LEVEL> - <message>` and mirrored to the process log.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        })
    }
}

pub struct CallLog {
    path: PathBuf,
    stream_sid: String,
    writer: BufWriter<File>,
}

impl CallLog {
    /// `call_<YYYYmmdd_HHMMSS>_<sid>.log`, with anything outside
    /// `[A-Za-z0-9_-]` in the SID replaced so it cannot escape the directory.
    pub fn file_name(started_at: DateTime<Local>, stream_sid: &str) -> String {
        let sid: String = stream_sid
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("call_{}_{}.log", started_at.format("%Y%m%d_%H%M%S"), sid)
    }

    pub async fn create(dir: &Path, stream_sid: &str) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(Self::file_name(Local::now(), stream_sid));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(stream_sid, path = %path.display(), "opened call log");
        Ok(Self {
            path,
            stream_sid: stream_sid.to_string(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stream_sid(&self) -> &str {
        &self.stream_sid
    }

    pub async fn info(&mut self, message: &str) {
        self.write(LogLevel::Info, message).await
    }

    pub async fn warn(&mut self, message: &str) {
        self.write(LogLevel::Warning, message).await
    }

    pub async fn error(&mut self, message: &str) {
        self.write(LogLevel::Error, message).await
    }

    /// Each line is flushed as it is written, so a call task that is dropped
    /// mid-call still leaves its log on disk. A failed write is reported to the
    /// process log and otherwise ignored so that logging never ends a call.
    pub async fn write(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(stream_sid = %self.stream_sid, "{}", message),
            LogLevel::Warning => tracing::warn!(stream_sid = %self.stream_sid, "{}", message),
            LogLevel::Error => tracing::error!(stream_sid = %self.stream_sid, "{}", message),
        }

        let line = format_line(Local::now(), level, message);
        let written = match self.writer.write_all(line.as_bytes()).await {
            Ok(()) => self.writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(stream_sid = %self.stream_sid, "failed to write call log: {}", e);
        }
    }

    /// Flushes buffered lines and closes the file.
    pub async fn close(mut self) -> io::Result<PathBuf> {
        self.writer.flush().await?;
        self.writer.into_inner().sync_all().await?;
        Ok(self.path)
    }
}

fn format_line(at: DateTime<Local>, level: LogLevel, message: &str) -> String {
    format!("{} - {} - {}\n", at.format("%Y-%m-%d %H:%M:%S,%3f"), level, message)
}

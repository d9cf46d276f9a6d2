//! Per-session transcript log
//!
//! One plain-text file per run at `<logs dir>/session-YYYY-MM-DD-N.txt`,
//! where N is the smallest number not yet taken for that date:
//!
//! ```text
//! === Session started at 2024-01-01T09:30:00.000000 ===
//! Boot doc: /path/to/boot.txt
//! Model: gpt-4 (temp: 0.7)
//! --------------------------------------------------
//!
//! [2024-01-01 09:30:12] USER:
//! Hello
//!
//! [2024-01-01 09:30:14] ASSISTANT:
//! Hi there.
//! ```

use chrono::{DateTime, Local, NaiveDate};
use clarity_core::{Error, Result, Role};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

fn log_name(date: NaiveDate, n: u32) -> String {
    format!("session-{}-{}.txt", date.format("%Y-%m-%d"), n)
}

/// What the header records about the session.
#[derive(Debug, Clone, Copy)]
pub struct LogHeader<'a> {
    pub boot_doc: &'a Path,
    pub model: &'a str,
    pub temperature: f32,
}

pub struct SessionLogger {
    path: PathBuf,
    file: File,
}

impl SessionLogger {
    /// First unused log path for `date` in `dir`.
    pub fn next_path(dir: &Path, date: NaiveDate) -> PathBuf {
        (1..)
            .map(|n| dir.join(log_name(date, n)))
            .find(|p| !p.exists())
            .unwrap_or_else(|| dir.join(log_name(date, 1)))
    }

    /// Open today's next log file and write the header.
    pub fn open(dir: &Path, header: LogHeader<'_>) -> Result<Self> {
        Self::open_at(dir, Local::now(), header)
    }

    /// Open the next log file for the date of `started`. The file is created
    /// exclusively; a name taken between the scan and the create triggers a
    /// rescan.
    pub fn open_at(dir: &Path, started: DateTime<Local>, header: LogHeader<'_>) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::persistence(dir, e))?;

        let date = started.date_naive();
        let (path, file) = loop {
            let path = Self::next_path(dir, date);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::persistence(&path, e)),
            }
        };

        let mut logger = Self { path, file };
        let text = format!(
            "=== Session started at {} ===\nBoot doc: {}\nModel: {} (temp: {})\n{}\n\n",
            started.format("%Y-%m-%dT%H:%M:%S%.6f"),
            header.boot_doc.display(),
            header.model,
            header.temperature,
            "-".repeat(50)
        );
        logger.write(&text)?;
        info!("Session log at {}", logger.path.display());
        Ok(logger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped entry.
    pub fn append(&mut self, role: Role, content: &str) -> Result<()> {
        let entry = format!(
            "[{}] {}:\n{}\n\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            role.label(),
            content
        );
        self.write(&entry)
    }

    fn write(&mut self, text: &str) -> Result<()> {
        self.file
            .write_all(text.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::persistence(&self.path, e))
    }
}

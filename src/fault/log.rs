//! Append-only diagnostic log for faults.
//!
//! Writes are best effort: a failure to log is reported through `tracing`
//! and never replaces the fault being handled.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use tracing::warn;

use super::Fault;

/// Append a full diagnostic entry for `fault`.
pub fn write_fault(log_file: &Path, fault: &Fault, error_id: &str, url: &str) {
    let entry = format_entry(fault, error_id, url);
    if let Err(e) = append(log_file, &entry) {
        warn!(path = %log_file.display(), error = %e, "could not write fault log");
    }
}

/// The minimal path used when formatting the error page itself failed.
pub fn write_minimal(log_file: &Path, message: &str) {
    let line = format!("[{}] secondary fault: {}\n", timestamp(), message);
    if append(log_file, &line).is_err() {
        let _ = io::stderr().write_all(line.as_bytes());
    }
}

fn format_entry(fault: &Fault, error_id: &str, url: &str) -> String {
    let mut entry = format!(
        "[{}] [{}] {} {} (status {}) url=/{}\n",
        timestamp(),
        error_id,
        match fault.kind {
            super::FaultKind::Raised => "fault",
            super::FaultKind::Panic => "panic",
        },
        fault.message,
        fault.status(),
        url.trim_start_matches('/'),
    );
    if let Some(location) = fault.location() {
        entry.push_str(&format!("  at {}\n", location));
    }
    for line in fault.trace.lines() {
        entry.push_str("    ");
        entry.push_str(line);
        entry.push('\n');
    }
    entry
}

fn append(log_file: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = log_file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(log_file)?;
    file.write_all(text.as_bytes())
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

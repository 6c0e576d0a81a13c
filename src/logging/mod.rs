//! Leveled diagnostic output
//!
//! This module provides the [`Logger`] used by every stage of a run. Standard output is
//! reserved for the resolved document stream, so all diagnostics are written to standard
//! error. The logger supports quiet, normal and verbose modes and tracks elapsed time.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Logger responsible for all user-visible diagnostics
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    fn emit(&self, line: &str) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        let _ = writeln!(handle, "{}", line);
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            self.emit(&format!("\n=== {} ===", title));
        }
    }

    /// Sub-section heading
    pub fn subsection(&self, title: &str) {
        if self.verbose && !self.quiet {
            self.emit(&format!("--- {} ---", title));
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.emit(&format!("📝 {}", message));
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.emit(&format!("ℹ️  {}", message));
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.emit(&format!("✅ {}", message));
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            self.emit(&format!("⚠️  WARNING: {}", message));
        }
    }

    /// Error message, shown even in quiet mode
    pub fn error(&self, message: &str) {
        self.emit(&format!("❌ ERROR: {}", message));
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            self.emit(&format!("▶️  {}", message));
        }
    }

    /// Detailed information (only shown in verbose mode)
    pub fn detail(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.emit(&format!("   {}", message));
        }
    }

    // Structured list output
    pub fn list(&self, title: &str, items: &[String]) {
        if !self.quiet {
            self.emit(&format!("\n📋 {}", title));
            for (i, item) in items.iter().enumerate() {
                self.emit(&format!("  {}. {}", i + 1, item));
            }

            if items.is_empty() {
                self.emit("  (No items to display)");
            }
        }
    }

    /// Format file size in human-readable units
    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let millis = duration.as_millis();
        let secs = duration.as_secs();
        if secs == 0 {
            format!("{}ms", millis)
        } else if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }

    /// Time elapsed since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

//! Rendering records and writing them to stderr.

use crate::config::{LogConfig, config};
use crate::level::{Format, Level};
use serde::Serialize;
use std::fmt;
use std::io::Write;

#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: String,
    level: &'a str,
    target: &'a str,
    message: &'a str,
}

/// Render one record as a line, without the trailing newline.
pub fn render(config: &LogConfig, level: Level, target: &str, message: &str) -> String {
    match config.format {
        Format::Json => {
            let record = JsonRecord {
                timestamp: chrono::Utc::now().to_rfc3339(),
                level: level.as_str(),
                target,
                message,
            };
            serde_json::to_string(&record).unwrap_or_else(|_| message.to_string())
        }
        Format::Pretty => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f ").to_string());
            }
            line.push_str(&format!("{:<5} ", level.as_str()));
            if config.target && !target.is_empty() {
                line.push_str(&format!("[{target}] "));
            }
            line.push_str(message);
            line
        }
        Format::Compact => {
            let mut line = String::new();
            if config.timestamps {
                line.push_str(&chrono::Local::now().format("%H:%M:%S ").to_string());
            }
            line.push_str(&level.as_str()[..1]);
            line.push(' ');
            if config.target && !target.is_empty() {
                line.push_str(&format!("{target}: "));
            }
            line.push_str(message);
            line
        }
    }
}

/// Write a record to stderr. The macros call this after checking
/// [`enabled`](crate::enabled).
#[doc(hidden)]
pub fn emit(level: Level, target: &str, args: fmt::Arguments<'_>) {
    let message = args.to_string();
    let line = render(config(), level, target, &message);
    let _ = writeln!(std::io::stderr().lock(), "{line}");
}

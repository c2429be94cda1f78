//! Mapping of rclone `--use-json-log` lines to engine events.

use serde::Deserialize;

use syncflow_protocols::{EngineEvent, LogAction, LogLevel};

#[derive(Debug, Deserialize)]
struct RcloneLogLine {
    level: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    object: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

fn level_of(raw: &str) -> LogLevel {
    match raw {
        "debug" => LogLevel::Debug,
        "notice" | "warning" => LogLevel::Warning,
        "error" | "critical" | "alert" | "emergency" => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

fn action_of(level: LogLevel, msg: &str) -> LogAction {
    if level == LogLevel::Error {
        return LogAction::Error;
    }
    if msg.starts_with("Copied") || msg.starts_with("Moved") {
        LogAction::Transferred
    } else if msg.starts_with("Deleted") {
        LogAction::Deleted
    } else if msg.contains("skipping") {
        LogAction::Skipped
    } else {
        LogAction::Unknown
    }
}

/// Parse one stderr line.
///
/// Blank lines and debug chatter not tied to a file yield `None`. Lines that
/// are not JSON are kept as informational messages.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Ok(parsed) = serde_json::from_str::<RcloneLogLine>(line) else {
        return Some(EngineEvent::message(LogLevel::Info, line));
    };

    let level = level_of(&parsed.level);
    let message = parsed.msg.trim().to_string();
    let action = action_of(level, &message);
    if level == LogLevel::Debug && action != LogAction::Skipped {
        return None;
    }

    let path = parsed.object.filter(|o| !o.is_empty());
    // A run-level error has no object; only per-file errors carry a path.
    let action = if action == LogAction::Error && path.is_none() {
        LogAction::Unknown
    } else {
        action
    };

    Some(EngineEvent {
        level,
        action,
        size: match action {
            LogAction::Transferred => parsed.size,
            _ => None,
        },
        path,
        message: (!message.is_empty()).then_some(message),
    })
}

use std::io::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};

use crate::logging::{LogMessage, Settings, METRIC_MSG_TARGET, PAYLOAD_KEY};
use crate::utils::jsonify;

/// Logs structured lines to stdout.
pub struct TerminalLogger {
    max_level: LevelFilter,
    metrics_enabled: bool,
}

impl TerminalLogger {
    pub fn new(settings: &Settings) -> Self {
        TerminalLogger {
            max_level: settings.max_level(),
            metrics_enabled: settings.metrics_enabled(),
        }
    }

    /// Renders `record` as a log line, or `None` if it is filtered out.
    pub fn prepare_log_line(&self, record: &Record) -> Option<String> {
        if !self.enabled(record.metadata()) {
            return None;
        }

        let log_message = LogMessage::from_record(record);

        Some(format!(
            "{timestamp} {loglevel} {priority} {facility} {payload_key}{payload}",
            timestamp = log_message.timestamp,
            loglevel = log_message.log_level.to_uppercase(),
            priority = log_message.priority,
            facility = log_message.process_name,
            payload_key = PAYLOAD_KEY,
            payload = jsonify(&log_message, false)
        ))
    }
}

impl Log for TerminalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        if metadata.target() == METRIC_MSG_TARGET && !self.metrics_enabled {
            return false;
        }
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if let Some(line) = self.prepare_log_line(record) {
            println!("{}", line);
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }
}

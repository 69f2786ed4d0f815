use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::env;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::process;

use chrono::{SecondsFormat, Utc};
use log::{Level, Record};
use serde::{Deserialize, Serialize};

use crate::logging::{
    DEFAULT_MESSAGE_KEY, DEFAULT_MESSAGE_TEMPLATE, LOG_MSG_TARGET, MESSAGE_TEMPLATE_KEY,
    METRIC_MSG_TARGET, PAYLOAD_KEY,
};

const MESSAGE_TYPE: &str = "presale-structured";
const MESSAGE_TYPE_VERSION: &str = "1.0.0";
const METRIC_LEVEL: &str = "Metric";
const METRIC_PRIORITY: u8 = 6;

lazy_static! {
    static ref PROCESS_NAME: String = env::args()
        .next()
        .as_ref()
        .and_then(|arg| Path::new(arg).file_stem())
        .and_then(|stem| stem.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "presale".to_string());
}

/// Hash of a message's content, used to spot duplicate lines.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    fn new(log_message: &LogMessage) -> MessageId {
        let mut hasher = DefaultHasher::new();
        log_message.timestamp.hash(&mut hasher);
        log_message.log_level.hash(&mut hasher);
        log_message.description.hash(&mut hasher);
        log_message.properties.hash(&mut hasher);
        MessageId(hasher.finish())
    }
}

/// container for log message data
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub timestamp: String,
    pub process_id: u32,
    pub process_name: String,
    pub log_level: String,
    pub priority: u8,
    pub message_type: String,
    pub message_type_version: String,
    pub message_id: MessageId,
    pub description: String,
    pub properties: BTreeMap<String, String>,
}

impl LogMessage {
    pub fn new(log_level: &str, priority: u8, properties: BTreeMap<String, String>) -> Self {
        let template = properties
            .get(MESSAGE_TEMPLATE_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_MESSAGE_TEMPLATE);
        let description = apply_template(template, &properties);

        let mut log_message = LogMessage {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            process_id: process::id(),
            process_name: PROCESS_NAME.clone(),
            log_level: log_level.to_string(),
            priority,
            message_type: MESSAGE_TYPE.to_string(),
            message_type_version: MESSAGE_TYPE_VERSION.to_string(),
            message_id: MessageId::default(),
            description,
            properties,
        };
        log_message.message_id = MessageId::new(&log_message);
        log_message
    }

    /// Builds a message from a `log` record.
    ///
    /// Records emitted by `log_details` or `log_metric` carry their properties as
    /// json; any other record is wrapped as a plain `{message}`.
    pub fn from_record(record: &Record) -> Self {
        let args = record.args().to_string();
        let target = record.target();

        let structured = if target == LOG_MSG_TARGET || target == METRIC_MSG_TARGET {
            serde_json::from_str::<BTreeMap<String, String>>(&args).ok()
        } else {
            None
        };

        let properties = structured.unwrap_or_else(|| {
            let mut properties = BTreeMap::new();
            properties.insert(DEFAULT_MESSAGE_KEY.to_string(), args);
            properties.insert(
                MESSAGE_TEMPLATE_KEY.to_string(),
                DEFAULT_MESSAGE_TEMPLATE.to_string(),
            );
            properties
        });

        if target == METRIC_MSG_TARGET {
            LogMessage::new(METRIC_LEVEL, METRIC_PRIORITY, properties)
        } else {
            let level = record.level();
            LogMessage::new(&level_name(level), priority(level), properties)
        }
    }

    /// Parses the json payload back out of a line written by the terminal logger.
    pub fn from_log_line(line: &str) -> Option<LogMessage> {
        let idx = line.find(PAYLOAD_KEY)?;
        serde_json::from_str(&line[idx + PAYLOAD_KEY.len()..]).ok()
    }
}

/// Replaces every `{key}` in `template` with the matching property value.
pub(crate) fn apply_template(template: &str, properties: &BTreeMap<String, String>) -> String {
    properties
        .iter()
        .filter(|(key, _)| key.as_str() != MESSAGE_TEMPLATE_KEY)
        .fold(template.to_string(), |description, (key, value)| {
            description.replace(&format!("{{{}}}", key), value)
        })
}

fn level_name(level: Level) -> String {
    match level {
        Level::Error => "Error",
        Level::Warn => "Warning",
        Level::Info => "Info",
        Level::Debug => "Debug",
        Level::Trace => "Trace",
    }
    .to_string()
}

/// syslog priorities: error 3, warning 4, info 5, debug 7
fn priority(level: Level) -> u8 {
    match level {
        Level::Error => 3,
        Level::Warn => 4,
        Level::Info => 5,
        Level::Debug | Level::Trace => 7,
    }
}

//! Structured logging on top of the `log` facade.
//!
//! Every line is written as
//! `{timestamp} {LEVEL} {priority} {facility} payload={json}` so that it can be
//! read by humans and parsed back by tooling via [`LogMessage::from_log_line`].

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{Level, SetLoggerError};

use crate::newtypes::CorrelationId;
use crate::utils::jsonify;

pub mod log_message;
mod logger;
mod settings;

pub use self::log_message::{LogMessage, MessageId};
pub use self::logger::TerminalLogger;
pub use self::settings::Settings;

/// Separates the human readable prefix of a log line from its json payload.
pub const PAYLOAD_KEY: &str = "payload=";

pub(crate) const LOG_MSG_TARGET: &str = "presale_logging";
pub(crate) const METRIC_MSG_TARGET: &str = "presale_metrics";
pub(crate) const MESSAGE_TEMPLATE_KEY: &str = "message_template";
pub(crate) const DEFAULT_MESSAGE_TEMPLATE: &str = "{message}";
pub(crate) const DEFAULT_MESSAGE_KEY: &str = "message";

/// Installs the terminal logger as the global `log` implementation.
///
/// Only the first call succeeds; later calls return the `SetLoggerError` from
/// the `log` crate.
pub fn initialize(settings: Settings) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(TerminalLogger::new(&settings)))?;
    log::set_max_level(settings.max_level());
    Ok(())
}

/// # Arguments
///
/// * `log_level` - log level of the message to be logged
/// * `message_format` - a message template to apply over properties by key
/// * `properties` - a collection of machine readable key / value properties which will be logged
pub fn log_details(
    log_level: Level,
    message_format: String,
    mut properties: BTreeMap<String, String>,
) {
    properties.insert(MESSAGE_TEMPLATE_KEY.to_string(), message_format);
    log::log!(target: LOG_MSG_TARGET, log_level, "{}", jsonify(&properties, false));
}

/// # Arguments
///
/// * `correlation_id` - a shared identifier used to group metrics
/// * `metric` - the name of the metric
/// * `tag` - a grouping tag for the metric
/// * `duration` - in seconds
pub fn log_duration(correlation_id: CorrelationId, metric: &str, tag: &str, duration: Duration) {
    log_metric(
        correlation_id,
        metric,
        tag,
        "duration_in_seconds",
        duration.as_secs_f64(),
    )
}

/// # Arguments
///
/// * `correlation_id` - a shared identifier used to group metrics
/// * `metric` - the name of the metric
/// * `tag` - a grouping tag for the metric
/// * `metric_key` - property key for metric's value
/// * `metric_value` - numeric value of metric
pub fn log_metric(
    correlation_id: CorrelationId,
    metric: &str,
    tag: &str,
    metric_key: &str,
    metric_value: f64,
) {
    let milliseconds_since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|from_epoch| from_epoch.as_millis())
        .unwrap_or_default();

    // https://prometheus.io/docs/instrumenting/exposition_formats/
    let tsd_metric = format!(
        "{}{{tag=\"{}\", correlation_id=\"{}\"}} {} {}",
        metric, tag, correlation_id, metric_value, milliseconds_since_epoch
    );

    let mut properties: BTreeMap<String, String> = BTreeMap::new();
    properties.insert("correlation_id".to_string(), correlation_id.to_string());
    properties.insert("time-series-data".to_string(), tsd_metric);
    properties.insert(metric_key.to_string(), format!("{:?}", metric_value));
    properties.insert(
        DEFAULT_MESSAGE_KEY.to_string(),
        format!("{} {} {}", metric, tag, metric_value),
    );
    properties.insert(
        MESSAGE_TEMPLATE_KEY.to_string(),
        DEFAULT_MESSAGE_TEMPLATE.to_string(),
    );

    log::log!(target: METRIC_MSG_TARGET, Level::Info, "{}", jsonify(&properties, false));
}

fn log_message(log_level: Level, message: &str) {
    let mut properties = BTreeMap::new();
    properties.insert(DEFAULT_MESSAGE_KEY.to_string(), message.to_string());
    log_details(log_level, DEFAULT_MESSAGE_TEMPLATE.to_string(), properties)
}

pub fn log_error(message: &str) {
    log_message(Level::Error, message)
}

pub fn log_warning(message: &str) {
    log_message(Level::Warn, message)
}

pub fn log_info(message: &str) {
    log_message(Level::Info, message)
}

pub fn log_debug(message: &str) {
    log_message(Level::Debug, message)
}

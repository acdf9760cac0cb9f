//! Structured gateway event logging.
//!
//! Every entry is one JSON line on stdout. Metadata keys containing `apikey`
//! (any casing) are masked before emission. When an external sink (Splunk,
//! Datadog, Elastic) is enabled, entries are shipped fire-and-forget on a
//! spawned task — sink failures are logged and never surfaced to the caller.

use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Mask substituted for redacted metadata values.
pub const REDACTED: &str = "********";

/// Log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// One external log sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub token: String,
}

impl SinkConfig {
    fn active(&self) -> bool {
        self.enabled && !self.endpoint.is_empty()
    }
}

/// Logging configuration: verbosity plus the optional sinks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// When false, DEBUG entries are dropped.
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub splunk: SinkConfig,

    #[serde(default)]
    pub datadog: SinkConfig,

    #[serde(default)]
    pub elastic: SinkConfig,
}

/// A structured log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Replace the value of any key whose lowercased form contains `apikey`.
pub fn redact_metadata(metadata: Map<String, Value>) -> Map<String, Value> {
    metadata
        .into_iter()
        .map(|(k, v)| {
            if k.to_lowercase().contains("apikey") {
                (k, Value::String(REDACTED.into()))
            } else {
                (k, v)
            }
        })
        .collect()
}

/// The gateway event logger. Configuration is replaceable at runtime through
/// the admin surface; reads clone under the mutex.
pub struct Logger {
    config: Mutex<LoggingConfig>,
    client: reqwest::Client,
}

impl Logger {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config: Mutex::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> LoggingConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_config(&self, config: LoggingConfig) {
        *self.config.lock().unwrap_or_else(|e| e.into_inner()) = config;
    }

    /// Emit one entry: redact, print the JSON line, ship to enabled sinks.
    pub fn log(
        &self,
        level: LogLevel,
        component: &str,
        message: &str,
        metadata: Map<String, Value>,
    ) {
        let config = self.config();
        if level == LogLevel::Debug && !config.verbose {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            component: component.to_string(),
            message: message.to_string(),
            metadata: redact_metadata(metadata),
        };

        println!("{}", render(&entry));
        self.ship(&config, entry);
    }

    pub fn debug(&self, component: &str, message: &str, metadata: Map<String, Value>) {
        self.log(LogLevel::Debug, component, message, metadata);
    }

    pub fn info(&self, component: &str, message: &str, metadata: Map<String, Value>) {
        self.log(LogLevel::Info, component, message, metadata);
    }

    pub fn error(&self, component: &str, message: &str, metadata: Map<String, Value>) {
        self.log(LogLevel::Error, component, message, metadata);
    }

    /// Fire-and-forget dispatch to every active sink. No backpressure: a slow
    /// sink can only delay its own spawned task.
    fn ship(&self, config: &LoggingConfig, entry: LogEntry) {
        if !config.splunk.active() && !config.datadog.active() && !config.elastic.active() {
            return;
        }
        // Outside a runtime (unit tests, early startup) sinks are skipped.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };

        if config.splunk.active() {
            let req = self
                .client
                .post(&config.splunk.endpoint)
                .header("Authorization", format!("Splunk {}", config.splunk.token))
                .json(&serde_json::json!({ "event": entry }));
            handle.spawn(send_to_sink("splunk", req));
        }
        if config.datadog.active() {
            let req = self
                .client
                .post(&config.datadog.endpoint)
                .header("DD-API-KEY", config.datadog.token.clone())
                .json(&serde_json::json!([entry]));
            handle.spawn(send_to_sink("datadog", req));
        }
        if config.elastic.active() {
            let req = self
                .client
                .post(&config.elastic.endpoint)
                .header("Authorization", format!("Bearer {}", config.elastic.token))
                .json(&entry);
            handle.spawn(send_to_sink("elastic", req));
        }
    }
}

async fn send_to_sink(sink: &'static str, req: reqwest::RequestBuilder) {
    match req.send().await {
        Ok(resp) if !resp.status().is_success() => {
            warn!(sink, status = resp.status().as_u16(), "log sink rejected entry");
        }
        Err(e) => {
            warn!(sink, error = %e, "log sink dispatch failed");
        }
        _ => {}
    }
}

/// Render an entry as its stdout JSON line.
pub fn render(entry: &LogEntry) -> String {
    serde_json::to_string(entry).unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", entry.message))
}

//! Structured logging with correlation tracking for remote fetch cycles
//!
//! Every fetch cycle gets a context carrying a correlation ID so the
//! started/response/completed lines of one cycle can be tied together in
//! the log file.

use super::config::{LogLevel, MonitoringConfig};
use super::error::FetchError;
use log::{debug, info, trace, warn};
use serde_json::json;
use std::time::{Duration, Instant};

/// Structured logger for fetch cycles
#[derive(Debug, Clone)]
pub struct FetchLogger {
    config: MonitoringConfig,
}

/// Context for a single fetch cycle
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Correlation ID for this cycle, empty when disabled
    pub correlation_id: String,
    /// Human readable name of the collection being refreshed
    pub collection: String,
    /// Resolved source URL, if resolution succeeded
    pub url: Option<String>,
    /// Start time for duration tracking
    pub start_time: Instant,
}

impl FetchLogger {
    pub fn new(config: MonitoringConfig) -> Self {
        Self { config }
    }

    /// Start tracking a new fetch cycle
    pub fn start_fetch(&self, collection: &str, url: Option<&str>) -> FetchContext {
        let correlation_id = if self.config.correlation_ids {
            uuid::Uuid::new_v4().to_string()
        } else {
            String::new()
        };

        let context = FetchContext {
            correlation_id,
            collection: collection.to_string(),
            url: url.map(str::to_string),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "fetch_started",
                "correlation_id": context.correlation_id,
                "collection": context.collection,
                "url": context.url,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            debug!("Fetch Started: {}", log_data);
        }

        context
    }

    /// Log the raw response status and size
    pub fn log_response(&self, context: &FetchContext, body_len: usize) {
        if !self.config.request_logging || !self.should_log(LogLevel::Trace) {
            return;
        }

        let log_data = json!({
            "event": "fetch_response",
            "correlation_id": context.correlation_id,
            "collection": context.collection,
            "bytes": body_len,
            "duration_ms": context.elapsed().as_millis(),
        });
        trace!("Fetch Response: {}", log_data);
    }

    /// Log a successful populate
    pub fn complete_fetch(&self, context: &FetchContext, entry_count: usize, changed: Option<bool>) {
        let duration = context.elapsed();

        if self.config.request_logging && self.should_log(LogLevel::Info) {
            let log_data = json!({
                "event": "fetch_completed",
                "correlation_id": context.correlation_id,
                "collection": context.collection,
                "url": context.url,
                "entries": entry_count,
                "changed": changed,
                "duration_ms": duration.as_millis(),
                "timestamp": chrono::Utc::now().to_rfc3339()
            });
            info!("Fetch Completed: {}", log_data);
        }

        self.log_slow_fetch(context, duration);
    }

    /// Log a failed cycle; always emitted at warn level or above
    pub fn fail_fetch(&self, context: &FetchContext, error: &FetchError) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "fetch_failed",
            "correlation_id": context.correlation_id,
            "collection": context.collection,
            "url": context.url,
            "error_kind": error.kind(),
            "status_code": error.status_code(),
            "error_message": error.to_string(),
            "duration_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });
        warn!("Fetch Failed: {}", log_data);
    }

    fn log_slow_fetch(&self, context: &FetchContext, duration: Duration) {
        if duration <= self.config.slow_fetch_threshold || !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "slow_fetch",
            "correlation_id": context.correlation_id,
            "collection": context.collection,
            "duration_ms": duration.as_millis(),
            "threshold_ms": self.config.slow_fetch_threshold.as_millis(),
        });
        warn!("Slow Fetch Detected: {}", log_data);
    }

    /// Check if we should log at the given level
    fn should_log(&self, level: LogLevel) -> bool {
        level <= self.config.log_level
    }
}

impl FetchContext {
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitoring(level: LogLevel, correlation_ids: bool) -> MonitoringConfig {
        MonitoringConfig {
            correlation_ids,
            request_logging: true,
            slow_fetch_threshold: Duration::from_secs(5),
            log_level: level,
        }
    }

    #[test]
    fn test_fetch_context_creation() {
        let logger = FetchLogger::new(monitoring(LogLevel::Debug, true));
        let context = logger.start_fetch("registry", Some("https://ring.example/rings.json"));

        assert_eq!(context.collection, "registry");
        assert_eq!(context.url.as_deref(), Some("https://ring.example/rings.json"));
        assert!(uuid::Uuid::parse_str(&context.correlation_id).is_ok());
    }

    #[test]
    fn test_correlation_ids_disabled() {
        let logger = FetchLogger::new(monitoring(LogLevel::Info, false));
        let context = logger.start_fetch("ring:default", None);

        assert!(context.correlation_id.is_empty());
        assert!(context.url.is_none());
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = FetchLogger::new(monitoring(LogLevel::Warn, true));

        assert!(logger.should_log(LogLevel::Error));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(!logger.should_log(LogLevel::Debug));
        assert!(!logger.should_log(LogLevel::Trace));
    }
}

//! Fetch and polling configuration with builder pattern
//!
//! Groups HTTP client settings, refresh cadence and fetch logging behind
//! one value with sane defaults.

use std::time::Duration;

/// Refresh interval used when neither the ring definition nor the user
/// configuration supplies one
pub const DEFAULT_REFRESH_SECONDS: u64 = 3600;

/// Lower bound on any polling cadence
pub const MIN_REFRESH_SECONDS: u64 = 5;

/// Configuration shared by every remote collection of a process
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub http: HttpConfig,
    pub polling: PollingConfig,
    pub monitoring: MonitoringConfig,
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

/// Refresh cadence settings
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub default_refresh: Duration,
    pub min_refresh: Duration,
}

/// Fetch logging configuration
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub correlation_ids: bool,
    pub request_logging: bool,
    pub slow_fetch_threshold: Duration,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("webring-nav/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_refresh: Duration::from_secs(DEFAULT_REFRESH_SECONDS),
            min_refresh: Duration::from_secs(MIN_REFRESH_SECONDS),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            correlation_ids: true,
            request_logging: true,
            slow_fetch_threshold: Duration::from_secs(5),
            log_level: LogLevel::Info,
        }
    }
}

impl PollingConfig {
    /// Turn an optional per-collection refresh in seconds into the cadence
    /// actually used, applying the fallback and the floor
    pub fn effective_interval(&self, seconds: Option<u64>) -> Duration {
        let requested = match seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => self.default_refresh,
        };
        requested.max(self.min_refresh)
    }
}

impl FetchConfig {
    /// Create a new builder for FetchConfig
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::new()
    }
}

/// Builder for FetchConfig
#[derive(Debug)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FetchConfig::default(),
        }
    }

    /// Set the whole-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.request_timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set the User-Agent sent with every request
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Set the fallback refresh interval in seconds
    pub fn default_refresh_seconds(mut self, seconds: u64) -> Self {
        self.config.polling.default_refresh = Duration::from_secs(seconds);
        self
    }

    /// Set the polling floor
    pub fn min_refresh(mut self, floor: Duration) -> Self {
        self.config.polling.min_refresh = floor;
        self
    }

    /// Enable/disable per-fetch request logging
    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    /// Enable/disable correlation IDs in fetch logs
    pub fn correlation_ids(mut self, enabled: bool) -> Self {
        self.config.monitoring.correlation_ids = enabled;
        self
    }

    /// Set logging level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> FetchConfig {
        self.config
    }
}

impl Default for FetchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();

        assert_eq!(config.http.request_timeout, Duration::from_secs(30));
        assert_eq!(config.polling.default_refresh, Duration::from_secs(3600));
        assert!(config.monitoring.request_logging);
        assert!(config.http.user_agent.starts_with("webring-nav/"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = FetchConfig::builder()
            .request_timeout(Duration::from_secs(3))
            .default_refresh_seconds(120)
            .user_agent("ring-test")
            .request_logging(false)
            .log_level(LogLevel::Trace)
            .build();

        assert_eq!(config.http.request_timeout, Duration::from_secs(3));
        assert_eq!(config.polling.default_refresh, Duration::from_secs(120));
        assert_eq!(config.http.user_agent, "ring-test");
        assert!(!config.monitoring.request_logging);
        assert_eq!(config.monitoring.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_effective_interval_floor_and_fallback() {
        let polling = PollingConfig::default();

        assert_eq!(polling.effective_interval(Some(60)), Duration::from_secs(60));
        assert_eq!(polling.effective_interval(None), Duration::from_secs(3600));
        assert_eq!(polling.effective_interval(Some(0)), Duration::from_secs(3600));
        assert_eq!(
            polling.effective_interval(Some(1)),
            Duration::from_secs(MIN_REFRESH_SECONDS)
        );
    }
}

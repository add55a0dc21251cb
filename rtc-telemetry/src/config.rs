//! Collector configuration.

use crate::transport::TransportKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.testrtc.com/v1/";
pub const DEFAULT_TEST_NAME: &str = "Unnamed remote test";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of one monitoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Key sent to the collector API with every request.
    pub api_key: String,
    /// Base URL of the collector API, with a trailing slash.
    pub api_url: String,
    /// Name of the remote test run.
    pub name: String,
    /// Turns on verbose logging in drivers that honor it.
    pub debug: bool,
    /// Whether the instrumentation hook should be installed at all.
    pub inject: bool,
    /// Interval between two stats polls of every channel.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
    /// Per-request timeout applied by network transports.
    #[serde(with = "duration_millis")]
    pub request_timeout: Duration,
    pub transport: TransportKind,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: DEFAULT_API_URL.to_owned(),
            name: DEFAULT_TEST_NAME.to_owned(),
            debug: false,
            inject: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            transport: TransportKind::Https,
        }
    }
}

/// Builder for [`TelemetryConfig`].
///
/// ```
/// use rtc_telemetry::config::TelemetryConfigBuilder;
/// use std::time::Duration;
///
/// let config = TelemetryConfigBuilder::new()
///     .with_api_key("secret")
///     .with_name("call quality run")
///     .with_poll_interval(Duration::from_millis(500))
///     .build();
///
/// assert_eq!(config.name, "call quality run");
/// assert_eq!(config.api_url, "https://api.testrtc.com/v1/");
/// ```
#[derive(Debug, Default, Clone)]
pub struct TelemetryConfigBuilder {
    config: TelemetryConfig,
}

impl TelemetryConfigBuilder {
    pub fn new() -> Self {
        TelemetryConfigBuilder::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    /// Overrides the collector URL. An empty URL keeps the default.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        if !api_url.is_empty() {
            self.config.api_url = api_url;
        }
        self
    }

    /// Overrides the test run name. An empty name keeps the default.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.config.name = name;
        }
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn with_inject(mut self, inject: bool) -> Self {
        self.config.inject = inject;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.config.poll_interval = poll_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.config.transport = transport;
        self
    }

    pub fn build(self) -> TelemetryConfig {
        self.config
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

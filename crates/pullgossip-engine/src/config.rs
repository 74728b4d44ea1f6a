//! Engine configuration.
//!
//! Durations are (de)serialized as integer milliseconds so that a config
//! file reads `digest_wait_ms = 1000` rather than a nested struct.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pullgossip_core::{PullError, Result};

/// Default time the initiator waits for digests after sending Hellos.
pub const DEFAULT_DIGEST_WAIT: Duration = Duration::from_millis(1000);
/// Default time a responder accepts a Request after answering a Hello.
pub const DEFAULT_REQUEST_WAIT: Duration = Duration::from_millis(1500);
/// Default time the initiator waits for responses after sending Requests.
pub const DEFAULT_RESPONSE_WAIT: Duration = Duration::from_millis(2000);
/// Default period between initiator rounds.
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_millis(4000);

/// Timing configuration for the pull engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullConfig {
    /// How long the digest window stays open after the Hellos go out.
    #[serde(rename = "digest_wait_ms", with = "millis")]
    pub digest_wait: Duration,
    /// How long an incoming Hello's nonce remains valid for a Request.
    #[serde(rename = "request_wait_ms", with = "millis")]
    pub request_wait: Duration,
    /// How long the response window stays open after the Requests go out.
    #[serde(rename = "response_wait_ms", with = "millis")]
    pub response_wait: Duration,
    /// Period of the round-initiation trigger.
    #[serde(rename = "pull_interval_ms", with = "millis")]
    pub pull_interval: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            digest_wait: DEFAULT_DIGEST_WAIT,
            request_wait: DEFAULT_REQUEST_WAIT,
            response_wait: DEFAULT_RESPONSE_WAIT,
            pull_interval: DEFAULT_PULL_INTERVAL,
        }
    }
}

impl PullConfig {
    /// Parse from a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| PullError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject durations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("digest_wait_ms", self.digest_wait),
            ("request_wait_ms", self.request_wait),
            ("response_wait_ms", self.response_wait),
            ("pull_interval_ms", self.pull_interval),
        ];
        for (name, value) in fields {
            if value.is_zero() {
                return Err(PullError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        Ok(())
    }

    pub fn with_digest_wait(mut self, wait: Duration) -> Self {
        self.digest_wait = wait;
        self
    }

    pub fn with_request_wait(mut self, wait: Duration) -> Self {
        self.request_wait = wait;
        self
    }

    pub fn with_response_wait(mut self, wait: Duration) -> Self {
        self.response_wait = wait;
        self
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    /// Length of one initiator round from Hello to teardown.
    pub fn round_duration(&self) -> Duration {
        self.digest_wait + self.response_wait
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = PullConfig::default();
        assert_eq!(config.digest_wait, Duration::from_millis(1000));
        assert_eq!(config.request_wait, Duration::from_millis(1500));
        assert_eq!(config.response_wait, Duration::from_millis(2000));
        assert_eq!(config.round_duration(), Duration::from_millis(3000));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PullConfig::from_toml_str("digest_wait_ms = 250\npull_interval_ms = 900\n")
            .unwrap();
        assert_eq!(config.digest_wait, Duration::from_millis(250));
        assert_eq!(config.pull_interval, Duration::from_millis(900));
        assert_eq!(config.request_wait, DEFAULT_REQUEST_WAIT);
        assert_eq!(config.response_wait, DEFAULT_RESPONSE_WAIT);
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = PullConfig::from_toml_str("response_wait_ms = 0").unwrap_err();
        assert!(matches!(err, PullError::InvalidConfig(msg) if msg.contains("response_wait_ms")));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(PullConfig::from_toml_str("digest_wait_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_serializes_as_millis() {
        let config = PullConfig::default().with_request_wait(Duration::from_millis(42));
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("request_wait_ms = 42"));
        assert_eq!(PullConfig::from_toml_str(&text).unwrap(), config);
    }
}

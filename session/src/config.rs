//! Desk configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use veriflow_types::{FlowParams, KindFamily};
use veriflow_utils::LogFormat;

use crate::retry::RetryPolicy;
use crate::SessionError;

/// Configuration for a [`VerificationDesk`](crate::VerificationDesk).
///
/// Can be loaded from a TOML file via [`DeskConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeskConfig {
    /// How often open flows re-evaluate their deadline.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Simulated wait before a system check is sent to the provider.
    #[serde(default = "default_processing_latency_ms")]
    pub processing_latency_ms: u64,

    /// Simulated wait before an attester review is sent to the provider.
    #[serde(default = "default_review_latency_ms")]
    pub review_latency_ms: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Resolver weights and expiry handling.
    #[serde(default)]
    pub params: FlowParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_processing_latency_ms() -> u64 {
    2_000
}

fn default_review_latency_ms() -> u64 {
    3_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    4_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DeskConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SessionError> {
        let config: Self = toml::from_str(s).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, SessionError> {
        toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.tick_interval_ms == 0 {
            return Err(SessionError::Config("tick_interval_ms must be positive".into()));
        }
        if !self.params.weights_are_valid() {
            return Err(SessionError::Config(
                "resolver weights exceed 10000 basis points".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(SessionError::Config(
                "initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Simulated wait before resolving a request of this family.
    pub fn latency_for(&self, family: KindFamily) -> Duration {
        match family {
            KindFamily::System => Duration::from_millis(self.processing_latency_ms),
            KindFamily::Attester => Duration::from_millis(self.review_latency_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            processing_latency_ms: default_processing_latency_ms(),
            review_latency_ms: default_review_latency_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            retry: RetryConfig::default(),
            params: FlowParams::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use veriflow_types::ExpiryPolicy;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = DeskConfig::default();
        let toml_str = config.to_toml_string().expect("should serialize");
        let parsed = DeskConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = DeskConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.latency_for(KindFamily::System), Duration::from_secs(2));
        assert_eq!(config.latency_for(KindFamily::Attester), Duration::from_secs(3));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.params.expiry_policy, ExpiryPolicy::Advisory);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            review_latency_ms = 10
            log_format = "json"

            [retry]
            max_attempts = 5

            [params]
            expiry_policy = "enforce"
        "#;
        let config = DeskConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.review_latency_ms, 10);
        assert_eq!(config.processing_latency_ms, 2_000);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 250);
        assert_eq!(config.params.expiry_policy, ExpiryPolicy::Enforce);
        assert_eq!(config.params.system_success_bps, 9_000);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            DeskConfig::from_toml_str("tick_interval_ms = 0"),
            Err(SessionError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_toml_str("[params]\nsystem_success_bps = 20000"),
            Err(SessionError::Config(_))
        ));
        assert!(matches!(
            DeskConfig::from_toml_str("tick_interval_ms = \"soon\""),
            Err(SessionError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_interval_ms = 250").unwrap();
        let config = DeskConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));

        assert!(matches!(
            DeskConfig::from_toml_file("/nonexistent/veriflow.toml"),
            Err(SessionError::Io(_))
        ));
    }
}

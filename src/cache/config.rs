//! Read-through cache configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, de};

/// Prefix of the environment variables read by [`CacheConfig::load`].
pub const ENV_PREFIX: &str = "READTHROUGH";

/// How cache keys are derived from a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// One slot per procedure path. Every request to a procedure shares it,
    /// whatever its payload.
    #[default]
    Procedure,
    /// One slot per procedure path and request payload; the key carries a
    /// SHA-256 fingerprint of the request's canonical encoding.
    ProcedureAndPayload,
}

/// What the cache layer does when a cache operation fails after the store
/// answered (undecodable entry, unencodable response, rejected write).
///
/// Store *read* errors always degrade to a pass-through, whatever the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Fail the call.
    #[default]
    Strict,
    /// Log the failure and answer as if no cache were installed.
    BestEffort,
}

/// Settings shared by the inbound and outbound interceptors.
///
/// | Setting         | Env var                         | Default         |
/// |-----------------|---------------------------------|-----------------|
/// | `ttl`           | `READTHROUGH_TTL_SECS`          | 5 seconds       |
/// | `bypass_header` | `READTHROUGH_BYPASS_HEADER`     | `Cache-Control` |
/// | `bypass_value`  | `READTHROUGH_BYPASS_VALUE`      | `no-cache`      |
/// | `namespace`     | `READTHROUGH_NAMESPACE`         | `cache`         |
/// | `key_strategy`  | `READTHROUGH_KEY_STRATEGY`      | `procedure`     |
/// | `failure_mode`  | `READTHROUGH_FAILURE_MODE`      | `strict`        |
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use readthrough::cache::{CacheConfig, FailureMode};
///
/// let config = CacheConfig::default()
///     .with_ttl(Duration::from_secs(30))
///     .with_failure_mode(FailureMode::BestEffort);
///
/// assert_eq!(config.ttl, Duration::from_secs(30));
/// assert_eq!(config.bypass_header, "Cache-Control");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of an entry after it is written.
    #[serde(rename = "ttl_secs", deserialize_with = "duration_from_secs")]
    pub ttl: Duration,
    /// Request header through which a caller opts out of the cache.
    pub bypass_header: String,
    /// Exact (case-sensitive) value of `bypass_header` that requests the opt-out.
    pub bypass_value: String,
    /// Tag prefixed to every key so entries do not collide with unrelated keys.
    pub namespace: String,
    pub key_strategy: KeyStrategy,
    pub failure_mode: FailureMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            bypass_header: "Cache-Control".to_string(),
            bypass_value: "no-cache".to_string(),
            namespace: "cache".to_string(),
            key_strategy: KeyStrategy::default(),
            failure_mode: FailureMode::default(),
        }
    }
}

impl CacheConfig {
    /// Loads the configuration from `READTHROUGH_*` environment variables,
    /// falling back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns a [`config::ConfigError`] if a variable holds a value of the wrong type.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let source = ::config::Config::builder()
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Self::from_config(source)
    }

    /// Deserializes the configuration from an already-built [`config::Config`].
    ///
    /// # Errors
    ///
    /// Returns a [`config::ConfigError`] if a key holds a value of the wrong type.
    pub fn from_config(source: ::config::Config) -> Result<Self, ::config::ConfigError> {
        source.try_deserialize()
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the opt-out header name and the value that triggers it.
    #[must_use]
    pub fn with_bypass(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.bypass_header = header.into();
        self.bypass_value = value.into();
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }
}

fn duration_from_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs)
        .map_err(|_| de::Error::custom(format!("invalid ttl_secs: {secs}")))
}

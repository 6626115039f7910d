use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`TransportConfig::timeout`], in seconds.
pub const TIMEOUT_ENV: &str = "PACKWRIGHT_HTTP_TIMEOUT_SECS";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Upper bound for a whole request, including reading the body.
    #[serde(with = "secs")]
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("packwright/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Defaults, with the timeout taken from `PACKWRIGHT_HTTP_TIMEOUT_SECS`
    /// when it holds a positive integer.
    pub fn from_env() -> Self {
        Self::default().with_timeout_override(std::env::var(TIMEOUT_ENV).ok().as_deref())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_timeout_override(self, raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::parse::<u64>) {
            Some(Ok(secs)) if secs > 0 => self.with_timeout(Duration::from_secs(secs)),
            Some(_) => {
                tracing::warn!("ignoring invalid {TIMEOUT_ENV}={}", raw.unwrap_or_default());
                self
            }
            None => self,
        }
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

//! Runtime configuration.
//!
//! Read from the environment with demo-friendly defaults. Missing
//! signing secrets are tolerated (with a warning) so a local sandbox
//! comes up without provisioning; production deployments set every
//! variable explicitly.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Insecure fallback batcher key used when `PRIVATE_KEY` is absent.
const DEMO_PRIVATE_KEY: &str =
    "1111111111111111111111111111111111111111111111111111111111111111";

/// Insecure fallback secret used when `JWT_SECRET` is absent.
const DEMO_JWT_SECRET: &str = "provenance-insecure-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Process-wide configuration shared by the daemon and the batcher.
#[derive(Debug, Clone)]
pub struct Config {
    /// Platform client endpoint, e.g. `tcp://localhost:4004`.
    pub validator_url: String,
    /// Directory holding the read-store database.
    pub data_dir: PathBuf,
    /// Database file name (without extension) inside `data_dir`.
    pub db_name: String,
    /// Fixed delay between reconnection / readiness retries.
    pub retry_wait: Duration,
    /// Batcher signing key, 64 hex characters.
    pub private_key: String,
    /// Secret for the HTTP layer's token auth.
    pub jwt_secret: String,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let validator_url =
            lookup("VALIDATOR_URL").unwrap_or_else(|| "tcp://localhost:4004".to_string());

        let data_dir = PathBuf::from(lookup("DATA_DIR").unwrap_or_else(|| "data".to_string()));
        let db_name = lookup("DB_NAME").unwrap_or_else(|| "provenance".to_string());

        let retry_wait = match lookup("RETRY_WAIT") {
            Some(raw) => {
                let millis: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "RETRY_WAIT",
                    reason: format!("expected milliseconds, got {:?}", raw),
                })?;
                Duration::from_millis(millis)
            }
            None => Duration::from_secs(5),
        };

        let private_key = match lookup("PRIVATE_KEY") {
            Some(key) => {
                if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(ConfigError::Invalid {
                        name: "PRIVATE_KEY",
                        reason: "expected 64 hex characters".to_string(),
                    });
                }
                key
            }
            None => {
                tracing::warn!("No PRIVATE_KEY set, using insecure demo key");
                DEMO_PRIVATE_KEY.to_string()
            }
        };

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("No JWT_SECRET set, using insecure demo secret");
            DEMO_JWT_SECRET.to_string()
        });

        Ok(Self {
            validator_url,
            data_dir,
            db_name,
            retry_wait,
            private_key,
            jwt_secret,
        })
    }

    /// Path of the read-store database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.db_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().cloned().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn defaults_are_demo_friendly() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.validator_url, "tcp://localhost:4004");
        assert_eq!(config.retry_wait, Duration::from_secs(5));
        assert_eq!(config.private_key, DEMO_PRIVATE_KEY);
        assert_eq!(config.db_path(), PathBuf::from("data/provenance.db"));
    }

    #[test]
    fn explicit_values_win() {
        let config = Config::from_lookup(lookup_from(&[
            ("VALIDATOR_URL", "tcp://validator:4004"),
            ("RETRY_WAIT", "250"),
            ("DB_NAME", "ledger"),
            ("DATA_DIR", "/var/lib/provenance"),
        ]))
        .unwrap();
        assert_eq!(config.validator_url, "tcp://validator:4004");
        assert_eq!(config.retry_wait, Duration::from_millis(250));
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/provenance/ledger.db"));
    }

    #[test]
    fn bad_private_key_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[("PRIVATE_KEY", "zz")]));
        assert!(result.is_err());
    }

    #[test]
    fn bad_retry_wait_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[("RETRY_WAIT", "soon")]));
        assert!(result.is_err());
    }
}

//! Strategy cache configuration (env-driven).

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::store::DbConfig;

/// Smallest accepted partner feed timeout.
const MIN_REMOTE_TIMEOUT_MS: u64 = 100;

/// Partner strategy feed settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Feed URL returning `{code, msg, data}`.
    pub url: String,

    /// Upper bound for one fetch, connect included. At least 100 ms.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    /// Run database migrations at startup.
    pub dev_mode: bool,
    pub sync_interval: Duration,
    /// Judge labels forming the hash ring.
    pub judges: Vec<String>,
    /// Partner feed, `None` when the integration is disabled.
    pub remote: Option<RemoteConfig>,
    pub database: DbConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = get("SCACHE_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8031".to_string())
            .parse()
            .context("SCACHE_LISTEN_ADDR must be a socket address.")?;

        let log_level = get("SCACHE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = get("SCACHE_DEV").map(|v| is_truthy(&v)).unwrap_or(false);

        let sync_interval_secs: u64 = get("SCACHE_SYNC_INTERVAL_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("SCACHE_SYNC_INTERVAL_SECS must be an integer (seconds).")?
            .unwrap_or(9);
        let sync_interval = Duration::from_secs(sync_interval_secs.max(1));

        let judges = get("SCACHE_JUDGES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let remote_enabled = get("SCACHE_REMOTE_ENABLE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        let remote = if remote_enabled {
            let url = get("SCACHE_REMOTE_URL")
                .filter(|v| !v.trim().is_empty())
                .context("SCACHE_REMOTE_URL is required when SCACHE_REMOTE_ENABLE is set.")?;

            let timeout_ms: u64 = get("SCACHE_REMOTE_TIMEOUT_MS")
                .map(|v| v.parse())
                .transpose()
                .context("SCACHE_REMOTE_TIMEOUT_MS must be an integer (milliseconds).")?
                .unwrap_or(10_000);

            if timeout_ms < MIN_REMOTE_TIMEOUT_MS {
                anyhow::bail!(
                    "SCACHE_REMOTE_TIMEOUT_MS must be at least {MIN_REMOTE_TIMEOUT_MS} (got {timeout_ms})."
                );
            }

            Some(RemoteConfig {
                url,
                timeout: Duration::from_millis(timeout_ms),
            })
        } else {
            None
        };

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            sync_interval,
            judges,
            remote,
            database: DbConfig::from_lookup(&get),
        })
    }
}

fn is_truthy(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.listen_addr.port(), 8031);
        assert_eq!(config.sync_interval, Duration::from_secs(9));
        assert!(config.judges.is_empty());
        assert!(config.remote.is_none());
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_judges_and_remote() {
        let config = load(&[
            ("SCACHE_JUDGES", "judge-a:6036, judge-b:6036,,"),
            ("SCACHE_REMOTE_ENABLE", "true"),
            ("SCACHE_REMOTE_URL", "http://partner.invalid/stras"),
            ("SCACHE_SYNC_INTERVAL_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(config.judges, vec!["judge-a:6036", "judge-b:6036"]);
        assert_eq!(config.sync_interval, Duration::from_secs(1));

        let remote = config.remote.unwrap();
        assert_eq!(remote.url, "http://partner.invalid/stras");
        assert_eq!(remote.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_remote_requires_url() {
        assert!(load(&[("SCACHE_REMOTE_ENABLE", "1")]).is_err());
    }

    #[test]
    fn test_remote_timeout_lower_bound() {
        let remote = |timeout: &'static str| {
            load(&[
                ("SCACHE_REMOTE_ENABLE", "1"),
                ("SCACHE_REMOTE_URL", "http://partner.invalid/stras"),
                ("SCACHE_REMOTE_TIMEOUT_MS", timeout),
            ])
        };

        assert!(remote("99").is_err());
        let config = remote("100").unwrap();
        assert_eq!(config.remote.unwrap().timeout, Duration::from_millis(100));
    }

    #[test]
    fn test_database_settings_use_lookup() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db.invalid/monstra"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("DB_MIN_CONNECTIONS", "many"),
        ])
        .unwrap();

        assert_eq!(config.database.database_url, "postgres://db.invalid/monstra");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.min_connections, 1);
    }

    #[test]
    fn test_invalid_interval() {
        assert!(load(&[("SCACHE_SYNC_INTERVAL_SECS", "soon")]).is_err());
    }
}

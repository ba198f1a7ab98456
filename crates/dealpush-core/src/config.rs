use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::{DispatchOptions, MAX_CONCURRENCY, MAX_REQUESTS_PER_SECOND};
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS};
use crate::upsert::UpsertConfig;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per record (including the first).
    pub max_attempts: u32,
    /// Base delay in milliseconds; attempt `n` waits about `base * 2^n`.
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
        }
    }
}

/// Global configuration loaded from `~/.config/dealpush/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealpushConfig {
    /// Base URL of the API; records are POSTed to `{api_url}/deals`.
    pub api_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum upserts in flight.
    pub concurrency: usize,
    /// Global request rate cap (0 = unlimited).
    pub requests_per_second: u32,
    /// Derive ids from sku/name for records with `id == 0`.
    pub derive_ids: bool,
    /// Sent as `X-API-Key` when set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Optional batch deadline in seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for DealpushConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001/api".to_string(),
            timeout_secs: 8,
            concurrency: 8,
            requests_per_second: 10,
            derive_ids: true,
            api_key: None,
            deadline_secs: None,
            retry: None,
        }
    }
}

impl DealpushConfig {
    /// Reject values the dispatcher cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api_url)
            .with_context(|| format!("invalid api_url {:?}", self.api_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_url must be http or https, got {:?}", url.scheme());
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.concurrency > MAX_CONCURRENCY {
            bail!(
                "concurrency must be at most {}, got {}",
                MAX_CONCURRENCY,
                self.concurrency
            );
        }
        if self.requests_per_second > MAX_REQUESTS_PER_SECOND {
            bail!(
                "requests_per_second must be at most {} (0 = unlimited), got {}",
                MAX_REQUESTS_PER_SECOND,
                self.requests_per_second
            );
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }
        if let Some(retry) = &self.retry {
            if retry.max_attempts == 0 {
                bail!("retry.max_attempts must be at least 1");
            }
        }
        Ok(())
    }

    pub fn upsert_config(&self) -> UpsertConfig {
        let retry = self.retry.clone().unwrap_or_default();
        UpsertConfig {
            base_url: self.api_url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(self.timeout_secs),
            max_attempts: retry.max_attempts,
            base_delay: Duration::from_millis(retry.base_delay_ms),
            jitter_seed: None,
        }
    }

    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            concurrency: self.concurrency,
            requests_per_second: self.requests_per_second,
            deadline: self.deadline_secs.map(Duration::from_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dealpush")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<DealpushConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = DealpushConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from a specific file.
pub fn load_from(path: &Path) -> Result<DealpushConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: DealpushConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_values() {
        let cfg = DealpushConfig::default();
        assert_eq!(cfg.api_url, "http://localhost:3001/api");
        assert_eq!(cfg.timeout_secs, 8);
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.requests_per_second, 10);
        assert!(cfg.derive_ids);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = DealpushConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: DealpushConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.api_url, cfg.api_url);
        assert_eq!(parsed.concurrency, cfg.concurrency);
        assert_eq!(parsed.requests_per_second, cfg.requests_per_second);
        assert!(parsed.api_key.is_none());
        assert!(parsed.retry.is_none());
    }

    #[test]
    fn config_toml_retry_and_extensions() {
        let toml = r#"
            api_url = "https://deals.example.com/api"
            timeout_secs = 3
            concurrency = 2
            requests_per_second = 0
            derive_ids = false
            api_key = "s3cret"
            deadline_secs = 60

            [retry]
            max_attempts = 6
            base_delay_ms = 50
        "#;
        let cfg: DealpushConfig = toml::from_str(toml).unwrap();
        cfg.validate().unwrap();

        let upsert = cfg.upsert_config();
        assert_eq!(upsert.base_url, "https://deals.example.com/api");
        assert_eq!(upsert.api_key.as_deref(), Some("s3cret"));
        assert_eq!(upsert.timeout, Duration::from_secs(3));
        assert_eq!(upsert.max_attempts, 6);
        assert_eq!(upsert.base_delay, Duration::from_millis(50));

        let opts = cfg.dispatch_options();
        assert_eq!(opts.concurrency, 2);
        assert_eq!(opts.requests_per_second, 0);
        assert_eq!(opts.deadline, Some(Duration::from_secs(60)));
    }

    #[test]
    fn empty_api_key_is_dropped() {
        let cfg = DealpushConfig {
            api_key: Some(String::new()),
            ..DealpushConfig::default()
        };
        assert!(cfg.upsert_config().api_key.is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_url = DealpushConfig {
            api_url: "localhost:3001".into(),
            ..DealpushConfig::default()
        };
        assert!(bad_url.validate().is_err());
        let zero = DealpushConfig {
            concurrency: 0,
            ..DealpushConfig::default()
        };
        assert!(zero.validate().is_err());
        let zero_attempts = DealpushConfig {
            retry: Some(RetryConfig {
                max_attempts: 0,
                base_delay_ms: 10,
            }),
            ..DealpushConfig::default()
        };
        assert!(zero_attempts.validate().is_err());
    }

    #[test]
    fn validate_bounds_concurrency_and_rate() {
        let at_limits = DealpushConfig {
            concurrency: MAX_CONCURRENCY,
            requests_per_second: MAX_REQUESTS_PER_SECOND,
            ..DealpushConfig::default()
        };
        assert!(at_limits.validate().is_ok());
        let wide = DealpushConfig {
            concurrency: usize::MAX,
            ..DealpushConfig::default()
        };
        assert!(wide.validate().is_err());
        let fast = DealpushConfig {
            requests_per_second: 2_000_000_000,
            ..DealpushConfig::default()
        };
        let err = fast.validate().unwrap_err().to_string();
        assert!(err.contains("requests_per_second"), "{err}");
    }

    #[test]
    fn load_from_file() {
        let f = NamedTempFile::new().unwrap();
        let mut cfg = DealpushConfig::default();
        cfg.concurrency = 3;
        fs::write(f.path(), toml::to_string_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(load_from(f.path()).unwrap().concurrency, 3);
    }
}

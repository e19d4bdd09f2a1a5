// src/ingest/config.rs
use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ingest::types::FetchParams;

pub const ENV_CONFIG_PATH: &str = "NEWSGRID_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/newsgrid.toml";

pub const ENV_NEWSDATA_KEY: &str = "NEWSDATA_API_KEY";
pub const ENV_NEWSAPI_KEY: &str = "NEWSAPI_API_KEY";

/// A named daily ingestion slot: a fixed UTC wall-clock time plus the
/// per-provider parameter sets pulled when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,
    /// "HH:MM", UTC.
    pub time: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub newsdata_requests: Vec<FetchParams>,
    #[serde(default)]
    pub newsapi_requests: Vec<FetchParams>,
}

impl SlotConfig {
    pub fn fire_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.time, "%H:%M")
            .with_context(|| format!("slot {} has invalid time {:?}", self.name, self.time))
    }

    /// (provider A, provider B) request counts — one upstream credit each.
    pub fn request_counts(&self) -> (usize, usize) {
        (self.newsdata_requests.len(), self.newsapi_requests.len())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Cached data older than this is reported stale by the freshness check.
    #[serde(default = "default_cache_expiry")]
    pub cache_expiry_minutes: i64,
    /// Fixed daily request budgets, one per provider.
    #[serde(default = "default_newsdata_limit")]
    pub newsdata_daily_limit: u32,
    #[serde(default = "default_newsapi_limit")]
    pub newsapi_daily_limit: u32,
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/newsgrid.sled")
}

fn default_cache_expiry() -> i64 {
    30
}

fn default_newsdata_limit() -> u32 {
    200
}

fn default_newsapi_limit() -> u32 {
    100
}

/// Built-in slot plan used when no config file exists: three slots spaced
/// across the day, small request matrix per provider.
fn default_slots() -> Vec<SlotConfig> {
    let slot = |name: &str, time: &str, description: &str, categories: &[&str]| SlotConfig {
        name: name.to_string(),
        time: time.to_string(),
        description: description.to_string(),
        newsdata_requests: categories
            .iter()
            .map(|c| FetchParams::for_slot(c, "us", "en"))
            .collect(),
        newsapi_requests: categories
            .iter()
            // "top" is a provider-A-only pseudo category.
            .filter(|c| **c != "top")
            .map(|c| FetchParams::for_slot(c, "us", "en"))
            .chain(std::iter::once(FetchParams {
                country: Some("us".to_string()),
                language: Some("en".to_string()),
                ..FetchParams::default()
            }))
            .collect(),
    };
    vec![
        slot(
            "MORNING",
            "06:00",
            "Early headlines: general, business, technology",
            &["top", "business", "technology"],
        ),
        slot(
            "MIDDAY",
            "12:00",
            "Midday refresh: general, sports, health",
            &["top", "sports", "health"],
        ),
        slot(
            "EVENING",
            "18:00",
            "Evening wrap: general, entertainment, science",
            &["top", "entertainment", "science"],
        ),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            cache_expiry_minutes: default_cache_expiry(),
            newsdata_daily_limit: default_newsdata_limit(),
            newsapi_daily_limit: default_newsapi_limit(),
            slots: default_slots(),
        }
    }
}

impl AppConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load order: $NEWSGRID_CONFIG_PATH, then config/newsgrid.toml, then
    /// built-in defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&PathBuf::from(p));
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from(&default_path);
        }
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        for slot in &self.slots {
            slot.fire_time()?;
        }
        Ok(())
    }

    /// Case-insensitive slot lookup.
    pub fn slot(&self, name: &str) -> Option<&SlotConfig> {
        self.slots.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// Upstream credentials, env-only (never in the config file).
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    pub newsdata: Option<String>,
    pub newsapi: Option<String>,
}

pub fn api_keys_from_env() -> ApiKeys {
    ApiKeys {
        newsdata: std::env::var(ENV_NEWSDATA_KEY).ok().filter(|s| !s.is_empty()),
        newsapi: std::env::var(ENV_NEWSAPI_KEY).ok().filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_three_valid_slots() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.slots.len(), 3);
        for slot in &cfg.slots {
            assert!(slot.fire_time().is_ok());
            let (a, b) = slot.request_counts();
            assert!(a > 0 && b > 0);
        }
        assert!(cfg.slot("morning").is_some());
        assert!(cfg.slot("NIGHT").is_none());
    }

    #[test]
    fn toml_config_parses_and_validates() {
        let toml = r#"
            bind_addr = "127.0.0.1:9000"
            cache_expiry_minutes = 15

            [[slots]]
            name = "DAWN"
            time = "05:30"

            [[slots.newsdata_requests]]
            category = "business"
            country = "gb"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.cache_expiry_minutes, 15);
        assert_eq!(cfg.slots.len(), 1);
        assert_eq!(
            cfg.slots[0].newsdata_requests[0].category.as_deref(),
            Some("business")
        );
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_slot_time_is_rejected() {
        let toml = r#"
            [[slots]]
            name = "BROKEN"
            time = "25:99"
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert!(cfg.validate().is_err());
    }
}

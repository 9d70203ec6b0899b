use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

/// Process-wide configuration, read once at startup.
///
/// Jobs load `.env.local` / `.env` first (see the bin mains), then build
/// this. Every accessor for a required credential fails loudly instead of
/// limping along without auth.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub base_url: String,
    pub bdl_api_key: Option<String>,
    pub odds_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let db_path = env_var("STATTRACKR_DB")
            .map(PathBuf::from)
            .or_else(default_db_path)
            .ok_or_else(|| anyhow!("STATTRACKR_DB not set and no cache dir available"))?;
        let base_url = env_var("STATTRACKR_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string());
        Ok(Self {
            db_path,
            base_url,
            bdl_api_key: env_var("BALLDONTLIE_API_KEY"),
            odds_api_key: env_var("ODDS_API_KEY"),
        })
    }

    pub fn require_bdl_key(&self) -> Result<&str> {
        self.bdl_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("BALLDONTLIE_API_KEY missing"))
    }

    pub fn require_odds_key(&self) -> Result<&str> {
        self.odds_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("ODDS_API_KEY missing"))
    }
}

fn env_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// XDG cache dir, falling back to `~/.cache`.
pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join("stattrackr"));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join("stattrackr"))
}

fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("api_cache.sqlite"))
}

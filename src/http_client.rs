use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;

const REQUEST_TIMEOUT_SECS: u64 = 15;

static CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Header set stats.nba.com requires before it will answer non-browser
/// clients.
pub fn nba_stats_headers() -> Vec<(&'static str, &'static str)> {
    vec![
        ("Accept", "application/json, text/plain, */*"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Origin", "https://www.nba.com"),
        ("Referer", "https://www.nba.com/stats/"),
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        ),
        ("Cache-Control", "no-cache"),
        ("Pragma", "no-cache"),
        ("x-nba-stats-origin", "stats"),
        ("x-nba-stats-token", "true"),
    ]
}

/// Fixed-width pool for outbound request batches.
pub fn fetch_pool(width: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(width.max(1))
        .build()
        .ok()
}

/// Runs `action` on the batch pool, or inline when the pool failed to build.
pub fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match pool {
        Some(pool) => pool.install(action),
        None => action(),
    }
}

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use serde::Deserialize;

use crate::http_client::{fetch_pool, http_client, with_fetch_pool};
use crate::retry::{RetryPolicy, is_transient};

const BDL_BASE: &str = "https://api.balldontlie.io/v1";
const PAGE_SIZE: u32 = 100;
// Hard stop for runaway cursors on a misbehaving endpoint.
const MAX_PAGES: u32 = 50;

/// Outbound batch shape: this many requests race at once, then the whole
/// batch is awaited and a fixed pause passes before the next one. Crude but
/// it keeps the aggregator's rate limiter quiet.
pub const BATCH_WIDTH: usize = 8;
const BATCH_PAUSE: Duration = Duration::from_millis(800);

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BdlStatLine {
    pub player: Option<BdlPlayerRef>,
    pub game: Option<BdlGameRef>,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub pts: f64,
    #[serde(default)]
    pub reb: f64,
    #[serde(default)]
    pub ast: f64,
    #[serde(default)]
    pub stl: f64,
    #[serde(default)]
    pub blk: f64,
    #[serde(default)]
    pub fg3m: f64,
    #[serde(default)]
    pub fga: f64,
    #[serde(default)]
    pub fta: f64,
    #[serde(default)]
    pub turnover: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BdlPlayerRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BdlGameRef {
    #[serde(default)]
    pub date: String,
}

fn get_page<T: serde::de::DeserializeOwned>(
    api_key: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<Paginated<T>> {
    let client = http_client()?;
    let url = format!("{BDL_BASE}/{path}");
    let policy = RetryPolicy::default();
    let body = policy.run(
        || {
            let resp = client
                .get(&url)
                .query(query)
                .header("Authorization", api_key)
                .send()
                .context("aggregator request failed")?;
            let status = resp.status();
            let body = resp.text().context("failed reading aggregator body")?;
            if !status.is_success() {
                return Err(anyhow!("http {}: {}", status, body.trim()));
            }
            Ok(body)
        },
        is_transient,
    )?;
    serde_json::from_str(&body).context("invalid aggregator json")
}

fn get_all_pages<T: serde::de::DeserializeOwned>(
    api_key: &str,
    path: &str,
    base_query: &[(String, String)],
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    let mut cursor: Option<u64> = None;
    for _ in 0..MAX_PAGES {
        let mut query = base_query.to_vec();
        query.push(("per_page".to_string(), PAGE_SIZE.to_string()));
        if let Some(c) = cursor {
            query.push(("cursor".to_string(), c.to_string()));
        }
        let page: Paginated<T> = get_page(api_key, path, &query)?;
        out.extend(page.data);
        cursor = page.meta.and_then(|m| m.next_cursor);
        if cursor.is_none() {
            break;
        }
    }
    Ok(out)
}

/// Season game logs for one player, newest last (vendor order).
pub fn fetch_stat_lines(api_key: &str, player_id: i64, season: i32) -> Result<Vec<BdlStatLine>> {
    let query = vec![
        ("player_ids[]".to_string(), player_id.to_string()),
        ("seasons[]".to_string(), season.to_string()),
    ];
    get_all_pages(api_key, "stats", &query)
}

/// Game logs for many players, issued in fixed-width concurrent batches
/// with a pause between batches. Results land in a map keyed by player id,
/// so completion order within a batch doesn't matter. Per-player failures
/// are collected, not fatal: a partial map plus warnings beats nothing.
pub fn fetch_stat_lines_batch(
    api_key: &str,
    player_ids: &[i64],
    season: i32,
) -> (HashMap<i64, Vec<BdlStatLine>>, Vec<String>) {
    let pool = fetch_pool(BATCH_WIDTH);
    let mut logs: HashMap<i64, Vec<BdlStatLine>> = HashMap::new();
    let mut warnings: Vec<String> = Vec::new();

    for (batch_no, batch) in player_ids.chunks(BATCH_WIDTH).enumerate() {
        if batch_no > 0 {
            std::thread::sleep(BATCH_PAUSE);
        }
        let results: Vec<(i64, Result<Vec<BdlStatLine>>)> = with_fetch_pool(&pool, || {
            batch
                .par_iter()
                .map(|id| (*id, fetch_stat_lines(api_key, *id, season)))
                .collect()
        });
        for (id, result) in results {
            match result {
                Ok(lines) => {
                    logs.insert(id, lines);
                }
                Err(err) => warnings.push(format!("player {id}: {err}")),
            }
        }
    }
    (logs, warnings)
}

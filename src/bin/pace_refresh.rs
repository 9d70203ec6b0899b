use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};
use rayon::prelude::*;

use stattrackr::cache_store::{
    CacheStore, DEFAULT_TTL_MINUTES, SEASON_LOCKED_TTL_MINUTES,
};
use stattrackr::config::Config;
use stattrackr::http_client::{fetch_pool, with_fetch_pool};
use stattrackr::pace::{self, TeamPace};
use stattrackr::stats_api::{self, TEAMS, season_label};

const BATCH_WIDTH: usize = 8;
const BATCH_PAUSE: Duration = Duration::from_millis(800);

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = Config::from_env()?;
    let season: i32 = flag_value("--season")
        .unwrap_or_else(|| current_season_start().to_string())
        .parse()
        .context("--season must be a start year, e.g. 2025")?;
    let refresh = has_flag("--refresh");

    let label = season_label(season);
    let cache = CacheStore::open(&config.db_path)?;
    let cache_key = format!("pace_ranks_{label}");
    if !refresh && cache.get(&cache_key)?.is_some() {
        println!("{cache_key}: cache fresh, skipping (use --refresh to force)");
        return Ok(());
    }

    println!("fetching game logs for {} teams, season {label}", TEAMS.len());
    let pool = fetch_pool(BATCH_WIDTH);
    let mut per_team: HashMap<String, (usize, f64)> = HashMap::new();
    let mut warnings: Vec<String> = Vec::new();

    for (batch_no, batch) in TEAMS.chunks(BATCH_WIDTH).enumerate() {
        if batch_no > 0 {
            std::thread::sleep(BATCH_PAUSE);
        }
        let results: Vec<(&str, Result<Vec<stats_api::TeamGameLogRow>>)> =
            with_fetch_pool(&pool, || {
                batch
                    .par_iter()
                    .map(|(abbr, team_id)| {
                        (*abbr, stats_api::fetch_team_game_log(*team_id, &label))
                    })
                    .collect()
            });
        for (abbr, result) in results {
            match result {
                Ok(log) => {
                    if let Some(stats) = pace::season_pace(&log) {
                        per_team.insert(abbr.to_string(), stats);
                    } else {
                        warnings.push(format!("{abbr}: no played games yet"));
                    }
                }
                Err(err) => warnings.push(format!("{abbr}: {err}")),
            }
        }
        println!("  batch {} done ({} teams so far)", batch_no + 1, per_team.len());
    }

    for warning in &warnings {
        println!("[WARN] {warning}");
    }
    if per_team.is_empty() {
        return Err(anyhow!("no team produced a pace figure, nothing to store"));
    }

    let table = pace::league_pace_table(&per_team);
    let ttl = ttl_for_season(season);
    cache.upsert(&cache_key, "pace", &serde_json::to_value(&table)?, ttl)?;
    let _ = cache.prune_expired();

    println!("pace refresh complete: {} of {} teams", table.len(), TEAMS.len());
    print_table(&table);
    Ok(())
}

fn print_table(table: &[TeamPace]) {
    for entry in table {
        let rank = entry
            .rank
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<3} {}  {:.2} poss/g over {} games",
            rank, entry.team, entry.possessions_per_game, entry.games
        );
    }
}

/// Season start year implied by the calendar: seasons flip in September.
fn current_season_start() -> i32 {
    let now = Utc::now();
    if now.month() >= 9 { now.year() } else { now.year() - 1 }
}

fn ttl_for_season(season_start_year: i32) -> i64 {
    if season_start_year < current_season_start() {
        SEASON_LOCKED_TTL_MINUTES
    } else {
        DEFAULT_TTL_MINUTES
    }
}

fn flag_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn has_flag(name: &str) -> bool {
    std::env::args().skip(1).any(|arg| arg == name)
}

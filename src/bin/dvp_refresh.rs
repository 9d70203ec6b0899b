use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};

use stattrackr::cache_store::{
    CacheStore, DEFAULT_TTL_MINUTES, SEASON_LOCKED_TTL_MINUTES,
};
use stattrackr::config::{Config, app_cache_dir};
use stattrackr::dvp::{self, DvpSummary, Metric};
use stattrackr::dvp_store::{DvpStore, RecordSource, TeamGameRecord};
use stattrackr::positions::RedistributionParams;
use stattrackr::stats_api::{TEAMS, season_label};

const DEFAULT_GAMES: usize = 20;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = Config::from_env()?;
    let team = flag_value("--team")
        .ok_or_else(|| anyhow!("usage: dvp_refresh --team=MIL --season=2025 [--games=20] [--metric=pts] [--refresh]"))?
        .to_ascii_uppercase();
    let season: i32 = flag_value("--season")
        .ok_or_else(|| anyhow!("--season is required (start year, e.g. 2025)"))?
        .parse()
        .context("--season must be a year")?;
    let games = flag_value("--games")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_GAMES);
    let metric = match flag_value("--metric") {
        Some(raw) => Metric::parse(&raw).ok_or_else(|| anyhow!("unknown metric: {raw}"))?,
        None => Metric::Pts,
    };
    let refresh = has_flag("--refresh");

    let cache = CacheStore::open(&config.db_path)?;
    let cache_key = dvp_cache_key(metric, &team, season);
    if !refresh && cache.get(&cache_key)?.is_some() {
        println!("{cache_key}: cache fresh, skipping (use --refresh to force)");
        return Ok(());
    }

    let params = RedistributionParams::default();
    let computation =
        dvp::compute_with_fallback(&team, season, games, metric, &config.base_url, &params)?;
    for warning in &computation.warnings {
        println!("[WARN] {warning}");
    }

    let store_root = app_cache_dir()
        .map(|dir| dir.join("dvp_store"))
        .unwrap_or_else(|| std::path::PathBuf::from("dvp_store"));
    let store = DvpStore::new(store_root);
    let records: Vec<TeamGameRecord> = computation
        .games
        .iter()
        .map(|(game_id, date, game)| TeamGameRecord {
            game_id: game_id.clone(),
            date: date.clone(),
            opponent: game.opponent.clone(),
            source: RecordSource::StatsApi,
            lineup_verified: game.lineup_verified,
            players: game.players.clone(),
        })
        .collect();
    let stored = store.append(&team, &computation.summary.season, records)?;

    let ttl = ttl_for_season(season);
    let payload = serde_json::to_value(&computation.summary)?;
    cache.upsert(&cache_key, "dvp", &payload, ttl)?;

    println!("DvP refresh complete");
    println!(
        "team={} season={} metric={} sample_games={} new_store_games={}",
        computation.summary.team,
        computation.summary.season,
        metric.as_str(),
        computation.summary.sample_games,
        stored
    );
    for bucket in ["PG", "SG", "SF", "PF", "C"] {
        let per_game = computation.summary.per_game.get(bucket).copied().unwrap_or(0.0);
        println!("  {bucket}: {per_game:.2}/game");
    }

    maybe_refresh_league_ranks(&cache, metric, season, ttl)?;
    Ok(())
}

/// Once every team's entry for this metric/season is cached, publish the
/// league-wide rank table alongside them.
fn maybe_refresh_league_ranks(
    cache: &CacheStore,
    metric: Metric,
    season: i32,
    ttl: i64,
) -> Result<()> {
    let mut per_team: HashMap<String, DvpSummary> = HashMap::new();
    for (abbr, _) in TEAMS {
        let Some(entry) = cache.get(&dvp_cache_key(metric, abbr, season))? else {
            println!(
                "league ranks pending: {} of {} teams cached",
                per_team.len(),
                TEAMS.len()
            );
            return Ok(());
        };
        let summary: DvpSummary =
            serde_json::from_value(entry.data).context("decode cached dvp summary")?;
        per_team.insert(abbr.to_string(), summary);
    }

    let ranks = dvp::league_ranks(&per_team);
    let key = format!("dvp_ranks_{}_{}", metric.as_str(), season_label(season));
    cache.upsert(&key, "dvp_ranks", &serde_json::to_value(&ranks)?, ttl)?;
    println!("league ranks refreshed under {key}");
    Ok(())
}

fn dvp_cache_key(metric: Metric, team: &str, season: i32) -> String {
    format!("dvp_{}_{}_{}", metric.as_str(), team, season_label(season))
}

/// Past seasons never change; the current one gets the checkpoint TTL.
fn ttl_for_season(season_start_year: i32) -> i64 {
    let now = Utc::now();
    let current_start = if now.month() >= 9 {
        now.year()
    } else {
        now.year() - 1
    };
    if season_start_year < current_start {
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

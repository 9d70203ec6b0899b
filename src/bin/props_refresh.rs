use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Utc};
use serde_json::{Map, Value, json};

use stattrackr::aggregator_api::{self, BdlStatLine};
use stattrackr::cache_store::{CacheStore, DEFAULT_TTL_MINUTES};
use stattrackr::config::{Config, app_cache_dir};
use stattrackr::dvp::Metric;
use stattrackr::player_ids::PlayerIdTable;
use stattrackr::positions::parse_minutes;
use stattrackr::props_api::{self, HIT_RATE_WINDOW, PropLine};
use stattrackr::stats_api::{PlayerGameRow, fetch_shot_chart, season_label};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = Config::from_env()?;
    let season: i32 = flag_value("--season")
        .unwrap_or_else(|| current_season_start().to_string())
        .parse()
        .context("--season must be a start year, e.g. 2025")?;
    let stats = parse_stats_flag(flag_value("--stats").as_deref())?;
    let (shard, shard_count) = parse_split_flag(flag_value("--split").as_deref())?;
    let refresh = has_flag("--refresh");
    let mapping_path = flag_value("--players")
        .map(PathBuf::from)
        .or_else(|| app_cache_dir().map(|dir| dir.join("player_ids.json")))
        .ok_or_else(|| anyhow!("--players not given and no cache dir available"))?;

    let label = season_label(season);
    let cache = CacheStore::open(&config.db_path)?;
    let cache_key = format!("player_props_{label}");
    if !refresh && shard_count == 1 && cache.get(&cache_key)?.is_some() {
        println!("{cache_key}: cache fresh, skipping (use --refresh to force)");
        return Ok(());
    }

    let ids = PlayerIdTable::load(&mapping_path)?;
    println!("loaded {} player id mappings from {}", ids.len(), mapping_path.display());

    let all_props = props_api::fetch_props_blob(config.require_odds_key()?)?;
    let props: Vec<PropLine> = all_props
        .into_iter()
        .filter(|p| stats.contains(&p.stat))
        .collect();
    println!("{} prop lines across requested stats", props.len());

    // Deterministic sharding so parallel invocations never overlap: sorted
    // unique player names, every shard_count-th starting at shard - 1.
    let players: Vec<String> = props
        .iter()
        .map(|p| p.player.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mine: Vec<&String> = players
        .iter()
        .skip(shard - 1)
        .step_by(shard_count)
        .collect();
    println!(
        "shard {shard}/{shard_count}: {} of {} players",
        mine.len(),
        players.len()
    );

    let mut warnings: Vec<String> = Vec::new();
    let mut mapped: Vec<(&String, i64, i64)> = Vec::new();
    for &name in &mine {
        match ids.by_name(name) {
            Some(m) => mapped.push((name, m.bdl_id, m.nba_id)),
            None => warnings.push(format!("{name}: no id mapping, skipped")),
        }
    }

    let bdl_ids: Vec<i64> = mapped.iter().map(|(_, bdl, _)| *bdl).collect();
    let (logs_by_id, batch_warnings) =
        aggregator_api::fetch_stat_lines_batch(config.require_bdl_key()?, &bdl_ids, season);
    warnings.extend(batch_warnings);

    let mut shard_players: BTreeMap<String, Value> = BTreeMap::new();
    for (name, bdl_id, nba_id) in &mapped {
        let lines = logs_by_id.get(bdl_id).map(Vec::as_slice).unwrap_or(&[]);
        let logs = to_game_rows(lines);
        let player_props: Vec<Value> = props
            .iter()
            .filter(|p| &p.player == *name)
            .map(|p| {
                let rate = props_api::hit_rate(p, &logs, HIT_RATE_WINDOW);
                json!({
                    "bookmaker": p.bookmaker,
                    "stat": p.stat.as_str(),
                    "line": p.line,
                    "over_odds": p.over_odds,
                    "under_odds": p.under_odds,
                    "hit_rate": rate,
                })
            })
            .collect();
        let zones = match fetch_shot_chart(*nba_id, 0, &label) {
            Ok(zones) => serde_json::to_value(zones)?,
            Err(err) => {
                warnings.push(format!("{name}: shot chart failed: {err}"));
                Value::Null
            }
        };
        shard_players.insert(
            (*name).clone(),
            json!({
                "props": player_props,
                "usage_per36": props_api::usage_rate_per36(&logs),
                "shot_zones": zones,
                "games_sampled": logs.len(),
            }),
        );
    }

    for warning in &warnings {
        println!("[WARN] {warning}");
    }

    // Shards share one cache row, merging their player maps into it.
    cache.upsert_merged(&cache_key, "props", DEFAULT_TTL_MINUTES, |current| {
        let mut players_map = current
            .and_then(|v| v.get("players"))
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_else(Map::new);
        for (name, payload) in &shard_players {
            players_map.insert(name.clone(), payload.clone());
        }
        json!({
            "season": label,
            "players": players_map,
        })
    })?;

    println!(
        "props refresh complete: {} players written under {}",
        shard_players.len(),
        cache_key
    );
    Ok(())
}

/// Vendor order is oldest first; hit rates want the most recent games at the
/// front.
fn to_game_rows(lines: &[BdlStatLine]) -> Vec<PlayerGameRow> {
    let mut rows: Vec<PlayerGameRow> = lines
        .iter()
        .map(|line| PlayerGameRow {
            game_date: line
                .game
                .as_ref()
                .map(|g| g.date.clone())
                .unwrap_or_default(),
            minutes: parse_minutes(line.min.as_deref().unwrap_or("")),
            pts: line.pts,
            reb: line.reb,
            ast: line.ast,
            fg3m: line.fg3m,
            stl: line.stl,
            blk: line.blk,
            fga: line.fga,
            fta: line.fta,
            tov: line.turnover,
        })
        .collect();
    rows.sort_by(|a, b| b.game_date.cmp(&a.game_date));
    rows
}

fn parse_stats_flag(raw: Option<&str>) -> Result<Vec<Metric>> {
    let Some(raw) = raw else {
        return Ok(vec![Metric::Pts, Metric::Reb, Metric::Ast]);
    };
    let mut out = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let metric = Metric::parse(part).ok_or_else(|| anyhow!("unknown stat: {part}"))?;
        if !out.contains(&metric) {
            out.push(metric);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("--stats given but empty"));
    }
    Ok(out)
}

/// `--split=2/4` means shard 2 of 4.
fn parse_split_flag(raw: Option<&str>) -> Result<(usize, usize)> {
    let Some(raw) = raw else {
        return Ok((1, 1));
    };
    let (n, m) = raw
        .split_once('/')
        .ok_or_else(|| anyhow!("--split must look like N/M"))?;
    let shard: usize = n.trim().parse().context("--split shard index")?;
    let count: usize = m.trim().parse().context("--split shard count")?;
    if shard == 0 || count == 0 || shard > count {
        return Err(anyhow!("--split out of range: {raw}"));
    }
    Ok((shard, count))
}

fn current_season_start() -> i32 {
    let now = Utc::now();
    if now.month() >= 9 { now.year() } else { now.year() - 1 }
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

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::dvp::Metric;
use crate::http_client::http_client;
use crate::retry::{RetryPolicy, is_transient};
use crate::stats_api::PlayerGameRow;

const PROPS_URL: &str = "https://api.bettingpros-mirror.com/v3/props/nba";

/// How many recent games a hit rate is computed over.
pub const HIT_RATE_WINDOW: usize = 10;

/// One offered player prop, normalized out of the bookmaker-keyed blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropLine {
    pub bookmaker: String,
    pub player: String,
    pub stat: Metric,
    pub line: f64,
    pub over_odds: Option<i32>,
    pub under_odds: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct PropsBlob {
    #[serde(default)]
    bookmakers: HashMap<String, BookmakerProps>,
}

#[derive(Debug, Deserialize)]
struct BookmakerProps {
    #[serde(default)]
    player_props: Vec<RawProp>,
}

#[derive(Debug, Deserialize)]
struct RawProp {
    player: String,
    stat: String,
    line: f64,
    #[serde(default)]
    over_odds: Option<i32>,
    #[serde(default)]
    under_odds: Option<i32>,
}

/// Flattens the blob into prop lines. Rows with a stat key we don't track
/// are dropped silently (new markets appear all the time); an unparseable
/// blob is an error.
pub fn parse_props_blob(raw: &str) -> Result<Vec<PropLine>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let blob: PropsBlob = serde_json::from_str(trimmed).context("invalid props json")?;
    let mut out = Vec::new();
    let mut books: Vec<_> = blob.bookmakers.into_iter().collect();
    books.sort_by(|a, b| a.0.cmp(&b.0));
    for (bookmaker, props) in books {
        for raw in props.player_props {
            let Some(stat) = Metric::parse(&raw.stat) else {
                continue;
            };
            out.push(PropLine {
                bookmaker: bookmaker.clone(),
                player: raw.player,
                stat,
                line: raw.line,
                over_odds: raw.over_odds,
                under_odds: raw.under_odds,
            });
        }
    }
    Ok(out)
}

pub fn fetch_props_blob(api_key: &str) -> Result<Vec<PropLine>> {
    let client = http_client()?;
    let policy = RetryPolicy::default();
    let body = policy.run(
        || {
            let resp = client
                .get(PROPS_URL)
                .query(&[("apiKey", api_key)])
                .send()
                .context("props request failed")?;
            let status = resp.status();
            let body = resp.text().context("failed reading props body")?;
            if !status.is_success() {
                return Err(anyhow!("http {}: {}", status, body.trim()));
            }
            Ok(body)
        },
        is_transient,
    )?;
    parse_props_blob(&body)
}

fn stat_value(metric: Metric, row: &PlayerGameRow) -> f64 {
    match metric {
        Metric::Pts => row.pts,
        Metric::Reb => row.reb,
        Metric::Ast => row.ast,
        Metric::Fg3m => row.fg3m,
        Metric::Stl => row.stl,
        Metric::Blk => row.blk,
    }
}

/// Share of the player's most recent games (up to `window`) where the stat
/// met or cleared the line. No games means no hit rate, not 0%.
pub fn hit_rate(prop: &PropLine, logs: &[PlayerGameRow], window: usize) -> Option<f64> {
    if logs.is_empty() || window == 0 {
        return None;
    }
    let sample: Vec<&PlayerGameRow> = logs.iter().take(window).collect();
    let hits = sample
        .iter()
        .filter(|row| stat_value(prop.stat, row) >= prop.line)
        .count();
    Some(hits as f64 / sample.len() as f64)
}

/// Crude per-36 usage proxy from game logs: true-shooting-ish volume
/// (FGA + 0.44 FTA + TOV) normalized to 36 minutes, averaged across games
/// the player actually played.
pub fn usage_rate_per36(logs: &[PlayerGameRow]) -> Option<f64> {
    let played: Vec<&PlayerGameRow> = logs.iter().filter(|r| r.minutes > 0.0).collect();
    if played.is_empty() {
        return None;
    }
    let sum: f64 = played
        .iter()
        .map(|r| (r.fga + 0.44 * r.fta + r.tov) / r.minutes * 36.0)
        .sum();
    Some(sum / played.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(pts: f64, minutes: f64) -> PlayerGameRow {
        PlayerGameRow {
            game_date: "2025-11-01".to_string(),
            minutes,
            pts,
            reb: 5.0,
            ast: 3.0,
            fg3m: 1.0,
            stl: 1.0,
            blk: 0.0,
            fga: 15.0,
            fta: 5.0,
            tov: 2.0,
        }
    }

    fn prop(stat: Metric, line: f64) -> PropLine {
        PropLine {
            bookmaker: "draftkings".to_string(),
            player: "A".to_string(),
            stat,
            line,
            over_odds: Some(-110),
            under_odds: Some(-110),
        }
    }

    #[test]
    fn hit_rate_counts_pushes_as_hits() {
        let logs = vec![game(25.0, 30.0), game(24.5, 30.0), game(20.0, 30.0)];
        let rate = hit_rate(&prop(Metric::Pts, 24.5), &logs, 10).expect("rate");
        assert!((rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn hit_rate_without_games_is_none() {
        assert!(hit_rate(&prop(Metric::Pts, 24.5), &[], 10).is_none());
    }

    #[test]
    fn hit_rate_window_limits_sample() {
        let mut logs = vec![game(30.0, 30.0); 2];
        logs.extend(vec![game(0.0, 30.0); 20]);
        let rate = hit_rate(&prop(Metric::Pts, 20.0), &logs, 2).expect("rate");
        assert!((rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn usage_skips_dnp_games() {
        let logs = vec![game(10.0, 36.0), game(0.0, 0.0)];
        let usage = usage_rate_per36(&logs).expect("usage");
        // One played game: (15 + 2.2 + 2) / 36 * 36.
        assert!((usage - 19.2).abs() < 1e-9);
    }

    #[test]
    fn unknown_stat_keys_are_dropped() {
        let raw = r#"{
            "bookmakers": {
                "draftkings": {
                    "player_props": [
                        {"player": "A", "stat": "pts", "line": 24.5, "over_odds": -110},
                        {"player": "A", "stat": "double_double", "line": 0.5}
                    ]
                }
            }
        }"#;
        let lines = parse_props_blob(raw).expect("parse");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].stat, Metric::Pts);
    }

    #[test]
    fn null_blob_is_empty() {
        assert!(parse_props_blob("null").expect("parse").is_empty());
    }
}

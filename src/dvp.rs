use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::http_client::http_client;
use crate::player_ids::norm_name;
use crate::positions::{ALL_BUCKETS, BoxScorePlayer, Bucket, RedistributionParams, classify_team};
use crate::ranks::{RankDirection, rank_of};
use crate::stats_api::{
    BoxScoreRow, abbr_for_team_id, fetch_boxscore, fetch_team_game_log, season_label,
    team_id_for_abbr,
};

pub const MAX_SAMPLE_GAMES: usize = 50;

/// Which counting stat a DvP table is built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Pts,
    Reb,
    Ast,
    Fg3m,
    Stl,
    Blk,
}

impl Metric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pts" => Some(Metric::Pts),
            "reb" => Some(Metric::Reb),
            "ast" => Some(Metric::Ast),
            "fg3m" => Some(Metric::Fg3m),
            "stl" => Some(Metric::Stl),
            "blk" => Some(Metric::Blk),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Pts => "pts",
            Metric::Reb => "reb",
            Metric::Ast => "ast",
            Metric::Fg3m => "fg3m",
            Metric::Stl => "stl",
            Metric::Blk => "blk",
        }
    }

    pub fn value_of(self, row: &BoxScoreRow) -> f64 {
        match self {
            Metric::Pts => row.pts,
            Metric::Reb => row.reb,
            Metric::Ast => row.ast,
            Metric::Fg3m => row.fg3m,
            Metric::Stl => row.stl,
            Metric::Blk => row.blk,
        }
    }
}

/// Per-bucket totals keyed by position label, plus sample size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DvpSummary {
    pub team: String,
    pub season: String,
    pub metric: Metric,
    pub sample_games: usize,
    pub totals: HashMap<String, f64>,
    pub per_game: HashMap<String, f64>,
}

/// One classified opponent game: what the team allowed per bucket.
#[derive(Debug, Clone)]
pub struct OpponentGame {
    pub opponent: String,
    pub buckets: [f64; 5],
    pub players: Vec<BoxScorePlayer>,
    pub lineup_verified: bool,
}

pub type DepthChartMap = HashMap<String, Bucket>;

/// Depth chart from the dashboard's own API, used to pin players to their
/// rostered bucket before any heuristic runs. Any failure degrades to an
/// empty map; the stat-shape classifier covers the gap.
pub fn fetch_depth_chart(base_url: &str, team_abbr: &str) -> DepthChartMap {
    let Ok(client) = http_client() else {
        return DepthChartMap::new();
    };
    let url = format!("{base_url}/api/depth-chart?team={team_abbr}");
    let Ok(resp) = client.get(&url).send() else {
        return DepthChartMap::new();
    };
    if !resp.status().is_success() {
        return DepthChartMap::new();
    }
    let Ok(parsed) = resp.json::<DepthChartResponse>() else {
        return DepthChartMap::new();
    };
    depth_chart_to_map(&parsed)
}

#[derive(Debug, Deserialize)]
struct DepthChartResponse {
    #[serde(rename = "depthChart", default)]
    depth_chart: HashMap<String, Vec<serde_json::Value>>,
}

fn depth_chart_to_map(resp: &DepthChartResponse) -> DepthChartMap {
    let mut out = DepthChartMap::new();
    for (code, entries) in &resp.depth_chart {
        let Some(bucket) = Bucket::from_code(code) else {
            continue;
        };
        for entry in entries {
            let name = match entry {
                serde_json::Value::String(s) => Some(s.as_str()),
                serde_json::Value::Object(obj) => obj.get("name").and_then(|v| v.as_str()),
                _ => None,
            };
            if let Some(name) = name {
                out.insert(norm_name(name), bucket);
            }
        }
    }
    out
}

/// Classifies one game's opponent rows and folds the metric into per-bucket
/// totals. Zero-valued rows are classified (team context matters) but not
/// accumulated. Returns `None` when the opponent can't be determined.
pub fn aggregate_opponent_game(
    rows: &[BoxScoreRow],
    own_team_id: i64,
    depth_chart: &DepthChartMap,
    metric: Metric,
    params: &RedistributionParams,
) -> Option<OpponentGame> {
    let opp_row = rows.iter().find(|r| r.team_id != own_team_id)?;
    let opp_id = opp_row.team_id;
    let opponent = abbr_for_team_id(opp_id)
        .map(|a| a.to_string())
        .or_else(|| {
            let a = opp_row.team_abbr.trim().to_ascii_uppercase();
            if a.is_empty() { None } else { Some(a) }
        })?;

    let opp_rows: Vec<&BoxScoreRow> = rows.iter().filter(|r| r.team_id == opp_id).collect();
    let mut players: Vec<BoxScorePlayer> = opp_rows.iter().map(|r| r.to_player()).collect();

    // Depth-chart buckets are authoritative: pin them across the heuristic
    // pass so redistribution only ever moves inferred assignments.
    let pinned: Vec<Option<Bucket>> = players
        .iter()
        .map(|p| depth_chart.get(&norm_name(&p.name)).copied())
        .collect();
    classify_team(&mut players, params);
    for (player, pin) in players.iter_mut().zip(&pinned) {
        if let Some(bucket) = pin {
            player.bucket = Some(*bucket);
        }
    }

    let mut buckets = [0.0f64; 5];
    for (row, player) in opp_rows.iter().zip(&players) {
        let value = metric.value_of(row);
        if value == 0.0 {
            continue;
        }
        let Some(bucket) = player.bucket else {
            continue;
        };
        let idx = ALL_BUCKETS.iter().position(|b| *b == bucket).unwrap_or(4);
        buckets[idx] += value;
    }

    Some(OpponentGame {
        opponent,
        buckets,
        players,
        lineup_verified: !depth_chart.is_empty(),
    })
}

#[derive(Debug)]
pub struct SeasonComputation {
    pub summary: DvpSummary,
    pub games: Vec<(String, String, OpponentGame)>, // (game_id, date, game)
    pub warnings: Vec<String>,
}

/// One season's DvP walk for a team: newest `max_games` games, classified
/// and aggregated. Per-game fetch failures are warnings, not fatal.
pub fn compute_season(
    team_abbr: &str,
    season_start_year: i32,
    max_games: usize,
    metric: Metric,
    base_url: &str,
    params: &RedistributionParams,
) -> Result<SeasonComputation> {
    let team_id = team_id_for_abbr(team_abbr)
        .ok_or_else(|| anyhow!("unknown team: {team_abbr}"))?;
    let season = season_label(season_start_year);

    let log = fetch_team_game_log(team_id, &season)
        .with_context(|| format!("team game log {team_abbr} {season}"))?;
    let sample: Vec<_> = log
        .iter()
        .take(max_games.clamp(1, MAX_SAMPLE_GAMES))
        .collect();

    let mut totals = [0.0f64; 5];
    let mut games = Vec::new();
    let mut warnings = Vec::new();
    let mut depth_charts: HashMap<String, DepthChartMap> = HashMap::new();

    for row in sample {
        let box_rows = match fetch_boxscore(&row.game_id) {
            Ok(rows) => rows,
            Err(err) => {
                warnings.push(format!("game {}: {err}", row.game_id));
                continue;
            }
        };
        // Opponent resolve before the depth chart fetch so we only hit the
        // dashboard API once per opponent.
        let Some(opp_id) = box_rows.iter().find(|r| r.team_id != team_id).map(|r| r.team_id)
        else {
            warnings.push(format!("game {}: no opponent rows", row.game_id));
            continue;
        };
        let opp_abbr = abbr_for_team_id(opp_id).unwrap_or("").to_string();
        let depth_chart = depth_charts
            .entry(opp_abbr.clone())
            .or_insert_with(|| fetch_depth_chart(base_url, &opp_abbr));

        let Some(game) = aggregate_opponent_game(&box_rows, team_id, depth_chart, metric, params)
        else {
            warnings.push(format!("game {}: could not aggregate", row.game_id));
            continue;
        };
        for (total, value) in totals.iter_mut().zip(game.buckets) {
            *total += value;
        }
        games.push((row.game_id.clone(), row.game_date.clone(), game));
    }

    let processed = games.len();
    let mut totals_map = HashMap::new();
    let mut per_game_map = HashMap::new();
    for (idx, bucket) in ALL_BUCKETS.iter().enumerate() {
        totals_map.insert(bucket.label().to_string(), totals[idx]);
        per_game_map.insert(
            bucket.label().to_string(),
            if processed > 0 {
                totals[idx] / processed as f64
            } else {
                0.0
            },
        );
    }

    Ok(SeasonComputation {
        summary: DvpSummary {
            team: team_abbr.to_ascii_uppercase(),
            season,
            metric,
            sample_games: processed,
            totals: totals_map,
            per_game: per_game_map,
        },
        games,
        warnings,
    })
}

/// Requested season first; when it yields no processed games (offseason,
/// early schedule), fall back to the season before.
pub fn compute_with_fallback(
    team_abbr: &str,
    season_start_year: i32,
    max_games: usize,
    metric: Metric,
    base_url: &str,
    params: &RedistributionParams,
) -> Result<SeasonComputation> {
    let current = compute_season(team_abbr, season_start_year, max_games, metric, base_url, params)?;
    if current.summary.sample_games > 0 {
        return Ok(current);
    }
    let previous = compute_season(
        team_abbr,
        season_start_year - 1,
        max_games,
        metric,
        base_url,
        params,
    )?;
    if previous.summary.sample_games > 0 {
        Ok(previous)
    } else {
        Ok(current)
    }
}

/// League-wide DvP ranks per bucket: fewer points allowed to a position is
/// better defense, so ranks are ascending on the per-game value.
pub fn league_ranks(
    per_team: &HashMap<String, DvpSummary>,
) -> HashMap<String, HashMap<String, usize>> {
    let mut out: HashMap<String, HashMap<String, usize>> = HashMap::new();
    for bucket in ALL_BUCKETS {
        let label = bucket.label();
        let values: Vec<f64> = per_team
            .values()
            .filter_map(|s| s.per_game.get(label).copied())
            .collect();
        for (team, summary) in per_team {
            let Some(value) = summary.per_game.get(label).copied() else {
                continue;
            };
            if let Some(rank) = rank_of(&values, value, RankDirection::Ascending) {
                out.entry(team.clone()).or_default().insert(label.to_string(), rank);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(team_id: i64, name: &str, start_pos: &str, pts: f64, reb: f64, ast: f64) -> BoxScoreRow {
        BoxScoreRow {
            team_id,
            team_abbr: if team_id == 1 { "MIL" } else { "BOS" }.to_string(),
            name: name.to_string(),
            start_pos: start_pos.to_string(),
            minutes: 25.0,
            pts,
            reb,
            ast,
            fg3m: 0.0,
            stl: 0.0,
            blk: 0.0,
        }
    }

    #[test]
    fn aggregates_opponent_rows_only() {
        let rows = vec![
            row(1, "Own Guy", "PG", 30.0, 5.0, 8.0),
            row(2, "Opp PG", "PG", 20.0, 3.0, 7.0),
            row(2, "Opp C", "C", 15.0, 12.0, 1.0),
        ];
        let game = aggregate_opponent_game(
            &rows,
            1,
            &DepthChartMap::new(),
            Metric::Pts,
            &RedistributionParams::default(),
        )
        .expect("game");
        assert_eq!(game.opponent, "BOS");
        assert_eq!(game.buckets[0], 20.0); // PG
        assert_eq!(game.buckets[4], 15.0); // C
        assert_eq!(game.buckets[1] + game.buckets[2] + game.buckets[3], 0.0);
    }

    #[test]
    fn depth_chart_pin_overrides_heuristic() {
        let mut depth = DepthChartMap::new();
        // Stat shape says guard; roster says small forward.
        depth.insert("bench guy".to_string(), Bucket::SF);
        let rows = vec![
            row(1, "Own Guy", "PG", 10.0, 2.0, 2.0),
            row(2, "Bench Guy", "", 12.0, 1.0, 4.0),
        ];
        let game = aggregate_opponent_game(
            &rows,
            1,
            &depth,
            Metric::Pts,
            &RedistributionParams::default(),
        )
        .expect("game");
        assert_eq!(game.buckets[2], 12.0); // SF
        assert!(game.lineup_verified);
    }

    #[test]
    fn zero_valued_rows_are_not_accumulated() {
        let rows = vec![
            row(1, "Own Guy", "PG", 10.0, 2.0, 2.0),
            row(2, "Scoreless", "SG", 0.0, 2.0, 1.0),
        ];
        let game = aggregate_opponent_game(
            &rows,
            1,
            &DepthChartMap::new(),
            Metric::Pts,
            &RedistributionParams::default(),
        )
        .expect("game");
        assert_eq!(game.buckets.iter().sum::<f64>(), 0.0);
        // Still classified, just not counted.
        assert_eq!(game.players[0].bucket, Some(Bucket::SG));
    }

    #[test]
    fn league_ranks_ascending_per_bucket() {
        let mut per_team = HashMap::new();
        for (team, allowed) in [("MIL", 20.0), ("BOS", 25.0), ("NYK", 22.5)] {
            let mut per_game = HashMap::new();
            per_game.insert("PG".to_string(), allowed);
            per_team.insert(
                team.to_string(),
                DvpSummary {
                    team: team.to_string(),
                    season: "2025-26".to_string(),
                    metric: Metric::Pts,
                    sample_games: 10,
                    totals: HashMap::new(),
                    per_game,
                },
            );
        }
        let ranks = league_ranks(&per_team);
        assert_eq!(ranks["MIL"]["PG"], 1);
        assert_eq!(ranks["NYK"]["PG"], 2);
        assert_eq!(ranks["BOS"]["PG"], 3);
    }
}

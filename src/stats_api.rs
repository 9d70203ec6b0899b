use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use crate::http_client::{http_client, nba_stats_headers};
use crate::positions::{BoxScorePlayer, parse_minutes};
use crate::retry::{RetryPolicy, is_transient};

const NBA_BASE: &str = "https://stats.nba.com/stats";

/// Static abbreviation <-> NBA team id table (stable vendor ids).
pub const TEAMS: [(&str, i64); 30] = [
    ("ATL", 1610612737),
    ("BOS", 1610612738),
    ("BKN", 1610612751),
    ("CHA", 1610612766),
    ("CHI", 1610612741),
    ("CLE", 1610612739),
    ("DAL", 1610612742),
    ("DEN", 1610612743),
    ("DET", 1610612765),
    ("GSW", 1610612744),
    ("HOU", 1610612745),
    ("IND", 1610612754),
    ("LAC", 1610612746),
    ("LAL", 1610612747),
    ("MEM", 1610612763),
    ("MIA", 1610612748),
    ("MIL", 1610612749),
    ("MIN", 1610612750),
    ("NOP", 1610612740),
    ("NYK", 1610612752),
    ("OKC", 1610612760),
    ("ORL", 1610612753),
    ("PHI", 1610612755),
    ("PHX", 1610612756),
    ("POR", 1610612757),
    ("SAC", 1610612758),
    ("SAS", 1610612759),
    ("TOR", 1610612761),
    ("UTA", 1610612762),
    ("WAS", 1610612764),
];

pub fn team_id_for_abbr(abbr: &str) -> Option<i64> {
    let wanted = abbr.trim().to_ascii_uppercase();
    TEAMS
        .iter()
        .find(|(a, _)| *a == wanted)
        .map(|(_, id)| *id)
}

pub fn abbr_for_team_id(team_id: i64) -> Option<&'static str> {
    TEAMS.iter().find(|(_, id)| *id == team_id).map(|(a, _)| *a)
}

/// `2025` -> `"2025-26"`.
pub fn season_label(start_year: i32) -> String {
    format!("{}-{:02}", start_year, (start_year + 1) % 100)
}

// ---------------------------------------------------------------------------
// resultSets envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    #[serde(rename = "resultSets", default)]
    pub result_sets: Vec<ResultSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultSet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(rename = "rowSet", default)]
    pub row_set: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Case-insensitive column lookup, first matching name wins. A missing
    /// column is "no data" for the caller, never a panic.
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        for name in names {
            if let Some(idx) = self
                .headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
            {
                return Some(idx);
            }
        }
        None
    }
}

impl StatsResponse {
    /// The per-player set, by name when present, else the first set.
    pub fn player_set(&self) -> Option<&ResultSet> {
        self.result_sets
            .iter()
            .find(|set| set.name.to_ascii_lowercase().contains("player"))
            .or_else(|| self.result_sets.first())
    }
}

pub fn cell_str(row: &[Value], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Missing or non-numeric cells count as zero (vendor rows use null for
/// players who did not record a stat).
pub fn cell_f64(row: &[Value], idx: Option<usize>) -> f64 {
    idx.and_then(|i| row.get(i))
        .map(|v| match v {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        })
        .unwrap_or(0.0)
}

/// GET against stats.nba.com with the browser header set and the shared
/// retry policy.
pub fn fetch_stats(path_and_query: &str) -> Result<StatsResponse> {
    let client = http_client()?;
    let url = format!("{NBA_BASE}/{path_and_query}");
    let policy = RetryPolicy::default();
    let body = policy.run(
        || {
            let mut req = client.get(&url);
            for (name, value) in nba_stats_headers() {
                req = req.header(name, value);
            }
            let resp = req.send().context("stats request failed")?;
            let status = resp.status();
            let body = resp.text().context("failed reading stats body")?;
            if !status.is_success() {
                return Err(anyhow!("http {}: {}", status, truncate(&body, 220)));
            }
            Ok(body)
        },
        is_transient,
    )?;
    serde_json::from_str(&body).context("invalid stats json")
}

fn truncate(body: &str, limit: usize) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// teamgamelog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TeamGameLogRow {
    pub game_id: String,
    pub game_date: String,
    pub matchup: String,
    pub fga: f64,
    pub fta: f64,
    pub tov: f64,
    pub oreb: f64,
}

pub fn fetch_team_game_log(team_id: i64, season: &str) -> Result<Vec<TeamGameLogRow>> {
    let resp = fetch_stats(&format!(
        "teamgamelog?TeamID={team_id}&Season={season}&SeasonType=Regular+Season"
    ))?;
    Ok(parse_team_game_log(&resp))
}

pub fn parse_team_game_log(resp: &StatsResponse) -> Vec<TeamGameLogRow> {
    let Some(set) = resp.result_sets.first() else {
        return Vec::new();
    };
    let game_id = set.column(&["Game_ID", "GAME_ID"]);
    let game_date = set.column(&["GAME_DATE"]);
    let matchup = set.column(&["MATCHUP"]);
    let fga = set.column(&["FGA"]);
    let fta = set.column(&["FTA"]);
    let tov = set.column(&["TOV"]);
    let oreb = set.column(&["OREB"]);
    if game_id.is_none() {
        return Vec::new();
    }
    set.row_set
        .iter()
        .filter_map(|row| {
            let id = cell_str(row, game_id);
            if id.is_empty() {
                return None;
            }
            Some(TeamGameLogRow {
                game_id: id,
                game_date: cell_str(row, game_date),
                matchup: cell_str(row, matchup),
                fga: cell_f64(row, fga),
                fta: cell_f64(row, fta),
                tov: cell_f64(row, tov),
                oreb: cell_f64(row, oreb),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// boxscoretraditionalv2
// ---------------------------------------------------------------------------

/// One player row from a traditional boxscore, with the full metric set the
/// DvP jobs aggregate over.
#[derive(Debug, Clone)]
pub struct BoxScoreRow {
    pub team_id: i64,
    pub team_abbr: String,
    pub name: String,
    pub start_pos: String,
    pub minutes: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub fg3m: f64,
    pub stl: f64,
    pub blk: f64,
}

impl BoxScoreRow {
    /// Starters are the rows the feed gives a start position.
    pub fn is_starter(&self) -> bool {
        !self.start_pos.trim().is_empty()
    }

    pub fn to_player(&self) -> BoxScorePlayer {
        BoxScorePlayer {
            name: self.name.clone(),
            starter: self.is_starter(),
            start_pos: self.start_pos.clone(),
            minutes: self.minutes,
            pts: self.pts,
            reb: self.reb,
            ast: self.ast,
            blk: self.blk,
            bucket: None,
        }
    }
}

pub fn fetch_boxscore(game_id: &str) -> Result<Vec<BoxScoreRow>> {
    let resp = fetch_stats(&format!(
        "boxscoretraditionalv2?GameID={game_id}&StartPeriod=0&EndPeriod=0&StartRange=0&EndRange=0&RangeType=0"
    ))?;
    Ok(parse_boxscore_rows(&resp))
}

pub fn parse_boxscore_rows(resp: &StatsResponse) -> Vec<BoxScoreRow> {
    let Some(set) = resp.player_set() else {
        return Vec::new();
    };
    let team_id = set.column(&["TEAM_ID"]);
    let team_abbr = set.column(&["TEAM_ABBREVIATION"]);
    let player = set.column(&["PLAYER_NAME"]);
    let start_pos = set.column(&["START_POSITION"]);
    let minutes = set.column(&["MIN"]);
    let pts = set.column(&["PTS"]);
    let reb = set.column(&["REB"]);
    let ast = set.column(&["AST"]);
    let fg3m = set.column(&["FG3M"]);
    let stl = set.column(&["STL"]);
    let blk = set.column(&["BLK"]);
    if team_id.is_none() || player.is_none() {
        return Vec::new();
    }
    set.row_set
        .iter()
        .filter_map(|row| {
            let name = cell_str(row, player);
            if name.is_empty() {
                return None;
            }
            Some(BoxScoreRow {
                team_id: cell_f64(row, team_id) as i64,
                team_abbr: cell_str(row, team_abbr),
                name,
                start_pos: cell_str(row, start_pos),
                minutes: parse_minutes(&cell_str(row, minutes)),
                pts: cell_f64(row, pts),
                reb: cell_f64(row, reb),
                ast: cell_f64(row, ast),
                fg3m: cell_f64(row, fg3m),
                stl: cell_f64(row, stl),
                blk: cell_f64(row, blk),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// playergamelog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlayerGameRow {
    pub game_date: String,
    pub minutes: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub fg3m: f64,
    pub stl: f64,
    pub blk: f64,
    pub fga: f64,
    pub fta: f64,
    pub tov: f64,
}

pub fn fetch_player_game_log(player_id: i64, season: &str) -> Result<Vec<PlayerGameRow>> {
    let resp = fetch_stats(&format!(
        "playergamelog?PlayerID={player_id}&Season={season}&SeasonType=Regular+Season"
    ))?;
    Ok(parse_player_game_log(&resp))
}

pub fn parse_player_game_log(resp: &StatsResponse) -> Vec<PlayerGameRow> {
    let Some(set) = resp.result_sets.first() else {
        return Vec::new();
    };
    let game_date = set.column(&["GAME_DATE"]);
    let minutes = set.column(&["MIN"]);
    let pts = set.column(&["PTS"]);
    let reb = set.column(&["REB"]);
    let ast = set.column(&["AST"]);
    let fg3m = set.column(&["FG3M"]);
    let stl = set.column(&["STL"]);
    let blk = set.column(&["BLK"]);
    let fga = set.column(&["FGA"]);
    let fta = set.column(&["FTA"]);
    let tov = set.column(&["TOV"]);
    if pts.is_none() {
        return Vec::new();
    }
    set.row_set
        .iter()
        .map(|row| PlayerGameRow {
            game_date: cell_str(row, game_date),
            minutes: parse_minutes(&cell_str(row, minutes)),
            pts: cell_f64(row, pts),
            reb: cell_f64(row, reb),
            ast: cell_f64(row, ast),
            fg3m: cell_f64(row, fg3m),
            stl: cell_f64(row, stl),
            blk: cell_f64(row, blk),
            fga: cell_f64(row, fga),
            fta: cell_f64(row, fta),
            tov: cell_f64(row, tov),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// shotchartdetail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct ShotZone {
    pub zone: String,
    pub attempts: u32,
    pub makes: u32,
    pub pct: f64,
}

pub fn fetch_shot_chart(player_id: i64, team_id: i64, season: &str) -> Result<Vec<ShotZone>> {
    let resp = fetch_stats(&format!(
        "shotchartdetail?PlayerID={player_id}&TeamID={team_id}&Season={season}&SeasonType=Regular+Season&ContextMeasure=FGA"
    ))?;
    Ok(parse_shot_zones(&resp))
}

pub fn parse_shot_zones(resp: &StatsResponse) -> Vec<ShotZone> {
    let Some(set) = resp.result_sets.first() else {
        return Vec::new();
    };
    let zone = set.column(&["SHOT_ZONE_BASIC"]);
    let made = set.column(&["SHOT_MADE_FLAG"]);
    let attempted = set.column(&["SHOT_ATTEMPTED_FLAG"]);
    if zone.is_none() || made.is_none() {
        return Vec::new();
    }
    let mut zones: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for row in &set.row_set {
        let name = cell_str(row, zone);
        if name.is_empty() {
            continue;
        }
        let attempted = attempted.is_none() || cell_f64(row, attempted) > 0.0;
        if !attempted {
            continue;
        }
        let entry = zones.entry(name).or_insert((0, 0));
        entry.0 += 1;
        if cell_f64(row, made) > 0.0 {
            entry.1 += 1;
        }
    }
    zones
        .into_iter()
        .map(|(zone, (attempts, makes))| ShotZone {
            zone,
            attempts,
            makes,
            pct: if attempts > 0 {
                makes as f64 / attempts as f64
            } else {
                0.0
            },
        })
        .collect()
}

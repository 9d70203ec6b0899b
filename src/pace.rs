use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ranks::{RankDirection, rank_of};
use crate::stats_api::TeamGameLogRow;

/// Standard possession estimate from counting stats:
/// `FGA - OREB + TOV + 0.44 * FTA`.
pub fn possessions(row: &TeamGameLogRow) -> f64 {
    row.fga - row.oreb + row.tov + 0.44 * row.fta
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPace {
    pub team: String,
    pub games: usize,
    pub possessions_per_game: f64,
    /// 1 = fastest team in the league.
    pub rank: Option<usize>,
}

/// Season-average possessions per team. Teams with no played games are
/// dropped rather than ranked at zero.
pub fn season_pace(log: &[TeamGameLogRow]) -> Option<(usize, f64)> {
    if log.is_empty() {
        return None;
    }
    let total: f64 = log.iter().map(possessions).sum();
    Some((log.len(), total / log.len() as f64))
}

/// League pace table: descending ranks, faster teams first.
pub fn league_pace_table(per_team: &HashMap<String, (usize, f64)>) -> Vec<TeamPace> {
    let values: Vec<f64> = per_team.values().map(|(_, pace)| *pace).collect();
    let mut out: Vec<TeamPace> = per_team
        .iter()
        .map(|(team, (games, pace))| TeamPace {
            team: team.clone(),
            games: *games,
            possessions_per_game: *pace,
            rank: rank_of(&values, *pace, RankDirection::Descending),
        })
        .collect();
    out.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.team.cmp(&b.team)));
    out
}

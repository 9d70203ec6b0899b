use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::positions::BoxScorePlayer;

/// Where a game's lineup information came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    StatsApi,
    ScrapedLineup,
}

/// One ingested game for one team, as persisted in the per-team/per-season
/// store file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamGameRecord {
    pub game_id: String,
    pub date: String,
    pub opponent: String,
    pub source: RecordSource,
    #[serde(default)]
    pub lineup_verified: bool,
    pub players: Vec<BoxScorePlayer>,
}

/// Append-only file store of `TeamGameRecord`s, one pretty-printed JSON
/// array per team and season.
pub struct DvpStore {
    root: PathBuf,
}

impl DvpStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn path_for(&self, team_abbr: &str, season: &str) -> PathBuf {
        self.root
            .join(format!("{}_{}.json", team_abbr.to_ascii_uppercase(), season))
    }

    /// An unreadable or malformed file reads as empty; the job re-ingests
    /// instead of crashing on a torn write from an older run.
    pub fn load(&self, team_abbr: &str, season: &str) -> Vec<TeamGameRecord> {
        let path = self.path_for(team_abbr, season);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    /// Merges `new_records` into the stored array, keyed by game id:
    /// existing games keep their stored record, new games are appended in
    /// date order. Returns how many were actually added.
    pub fn append(
        &self,
        team_abbr: &str,
        season: &str,
        new_records: Vec<TeamGameRecord>,
    ) -> Result<usize> {
        let mut records = self.load(team_abbr, season);
        let mut added = 0usize;
        for record in new_records {
            if records.iter().any(|r| r.game_id == record.game_id) {
                continue;
            }
            records.push(record);
            added += 1;
        }
        if added > 0 {
            records.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.game_id.cmp(&b.game_id)));
            self.write(&self.path_for(team_abbr, season), &records)?;
        }
        Ok(added)
    }

    fn write(&self, path: &Path, records: &[TeamGameRecord]) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).ok();
        }
        let json = serde_json::to_string_pretty(records).context("serialize dvp store")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).context("write dvp store")?;
        std::fs::rename(&tmp, path).context("swap dvp store")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(game_id: &str, date: &str) -> TeamGameRecord {
        TeamGameRecord {
            game_id: game_id.to_string(),
            date: date.to_string(),
            opponent: "BOS".to_string(),
            source: RecordSource::StatsApi,
            lineup_verified: false,
            players: Vec::new(),
        }
    }

    fn temp_store(tag: &str) -> DvpStore {
        let dir = std::env::temp_dir().join(format!(
            "stattrackr_dvp_store_{tag}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        DvpStore::new(dir)
    }

    #[test]
    fn append_is_keyed_by_game_id() {
        let store = temp_store("dedupe");
        let added = store
            .append("MIL", "2025-26", vec![record("001", "2025-11-01")])
            .unwrap();
        assert_eq!(added, 1);
        // Same game again plus one new: only the new one lands.
        let added = store
            .append(
                "MIL",
                "2025-26",
                vec![record("001", "2025-11-01"), record("002", "2025-11-03")],
            )
            .unwrap();
        assert_eq!(added, 1);
        let records = store.load("MIL", "2025-26");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].game_id, "001");
    }

    #[test]
    fn missing_file_reads_empty() {
        let store = temp_store("missing");
        assert!(store.load("BOS", "2025-26").is_empty());
    }

    #[test]
    fn malformed_file_reads_empty() {
        let store = temp_store("malformed");
        let path = store.path_for("NYK", "2025-26");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(store.load("NYK", "2025-26").is_empty());
    }
}

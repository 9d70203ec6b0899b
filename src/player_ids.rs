use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Correspondence between the two vendor id namespaces for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerIdMapping {
    pub name: String,
    pub bdl_id: i64,
    pub nba_id: i64,
}

/// Lookup table over the flat mapping file. Built once at process start and
/// passed into whatever needs it; never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct PlayerIdTable {
    entries: Vec<PlayerIdMapping>,
    by_bdl: HashMap<i64, usize>,
    by_nba: HashMap<i64, usize>,
    by_name: HashMap<String, usize>,
}

impl PlayerIdTable {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read player id mapping {}", path.display()))?;
        let entries: Vec<PlayerIdMapping> =
            serde_json::from_str(&raw).context("decode player id mapping")?;
        Ok(Self::from_entries(entries))
    }

    pub fn from_entries(entries: Vec<PlayerIdMapping>) -> Self {
        let mut by_bdl = HashMap::with_capacity(entries.len());
        let mut by_nba = HashMap::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            by_bdl.insert(entry.bdl_id, idx);
            by_nba.insert(entry.nba_id, idx);
            by_name.insert(norm_name(&entry.name), idx);
        }
        Self {
            entries,
            by_bdl,
            by_nba,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlayerIdMapping] {
        &self.entries
    }

    pub fn by_bdl_id(&self, id: i64) -> Option<&PlayerIdMapping> {
        self.by_bdl.get(&id).map(|idx| &self.entries[*idx])
    }

    pub fn by_nba_id(&self, id: i64) -> Option<&PlayerIdMapping> {
        self.by_nba.get(&id).map(|idx| &self.entries[*idx])
    }

    pub fn by_name(&self, name: &str) -> Option<&PlayerIdMapping> {
        self.by_name.get(&norm_name(name)).map(|idx| &self.entries[*idx])
    }
}

/// Display-name normalization shared with the depth-chart join: lowercase,
/// generational suffixes dropped, anything non-alphabetic collapsed to
/// single spaces.
pub fn norm_name(raw: &str) -> String {
    let lowered: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() { c } else { ' ' }
        })
        .collect();
    lowered
        .split_whitespace()
        .filter(|word| !matches!(*word, "jr" | "sr" | "ii" | "iii" | "iv"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_normalization_strips_suffixes_and_punctuation() {
        assert_eq!(norm_name("Gary Payton II"), "gary payton");
        assert_eq!(norm_name("Jaren Jackson Jr."), "jaren jackson");
        assert_eq!(norm_name("  O.G. Anunoby "), "o g anunoby");
    }

    #[test]
    fn lookups_work_across_namespaces() {
        let table = PlayerIdTable::from_entries(vec![PlayerIdMapping {
            name: "Giannis Antetokounmpo".to_string(),
            bdl_id: 15,
            nba_id: 203507,
        }]);
        assert_eq!(table.by_bdl_id(15).map(|m| m.nba_id), Some(203507));
        assert_eq!(table.by_nba_id(203507).map(|m| m.bdl_id), Some(15));
        assert!(table.by_name("giannis antetokounmpo").is_some());
        assert!(table.by_name("nobody").is_none());
    }
}

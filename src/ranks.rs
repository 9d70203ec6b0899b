use std::cmp::Ordering;

/// Which end of the sorted list counts as rank 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankDirection {
    /// Lower value = better (defensive metrics: fewer points allowed).
    Ascending,
    /// Higher value = better (pace: more possessions).
    Descending,
}

/// 1-based rank of `value` within `values`.
///
/// Ascending: the rank is the 1-based position of the first sorted entry
/// >= `value`; descending uses the first entry <= `value` after a
/// descending sort. When no entry qualifies the value gets the worst rank
/// (`values.len()`). An empty list has no ranks at all.
pub fn rank_of(values: &[f64], value: f64, direction: RankDirection) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    if direction == RankDirection::Descending {
        sorted.reverse();
    }
    let hit = sorted.iter().position(|v| match direction {
        RankDirection::Ascending => *v >= value,
        RankDirection::Descending => *v <= value,
    });
    Some(match hit {
        Some(idx) => idx + 1,
        None => values.len(),
    })
}

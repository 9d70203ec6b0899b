use serde::{Deserialize, Serialize};

/// Assigned position for one player in one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    PG,
    SG,
    SF,
    PF,
    C,
}

pub const ALL_BUCKETS: [Bucket; 5] = [Bucket::PG, Bucket::SG, Bucket::SF, Bucket::PF, Bucket::C];

impl Bucket {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "PG" => Some(Bucket::PG),
            "SG" => Some(Bucket::SG),
            "SF" => Some(Bucket::SF),
            "PF" => Some(Bucket::PF),
            "C" => Some(Bucket::C),
            _ => None,
        }
    }

    pub fn is_guard(self) -> bool {
        matches!(self, Bucket::PG | Bucket::SG)
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Bucket::SF | Bucket::PF)
    }

    pub fn label(self) -> &'static str {
        match self {
            Bucket::PG => "PG",
            Bucket::SG => "SG",
            Bucket::SF => "SF",
            Bucket::PF => "PF",
            Bucket::C => "C",
        }
    }
}

/// One player's single-game record as ingested from a boxscore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxScorePlayer {
    pub name: String,
    pub starter: bool,
    /// Raw start-position code from the feed: one of the five exact codes,
    /// generic "G"/"F", or empty for bench players.
    #[serde(default)]
    pub start_pos: String,
    pub minutes: f64,
    #[serde(default)]
    pub pts: f64,
    #[serde(default)]
    pub reb: f64,
    #[serde(default)]
    pub ast: f64,
    #[serde(default)]
    pub blk: f64,
    #[serde(default)]
    pub bucket: Option<Bucket>,
}

/// Tunables for the bench rebalancing pass. The defaults reproduce the
/// historical dashboard behavior; they are empirically tuned, not derived,
/// which is why they live in a params struct instead of constants.
#[derive(Debug, Clone, Copy)]
pub struct RedistributionParams {
    /// Share of an ideal bench that should be guards (rest are forwards).
    pub guard_share: f64,
    /// Hard cap on rebalancing iterations; prevents oscillation, does not
    /// guarantee all targets are met.
    pub max_iterations: u32,
    /// Bench sizes at or below this get a per-position cap of 1.
    pub small_bench: usize,
    /// Bench sizes at or below this get a per-position cap of 2; larger
    /// benches get 3.
    pub medium_bench: usize,
}

impl Default for RedistributionParams {
    fn default() -> Self {
        Self {
            guard_share: 0.55,
            max_iterations: 30,
            small_bench: 5,
            medium_bench: 8,
        }
    }
}

// A forward or guard pair this lopsided unlocks cross-divide moves.
const EXTREME_IMBALANCE: usize = 3;

/// Parse a minutes field that may be "MM:SS" or plain numeric. Anything
/// unparseable counts as zero minutes.
pub fn parse_minutes(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }
    if let Some((mins, secs)) = s.split_once(':') {
        let m = mins.trim().parse::<f64>().unwrap_or(0.0);
        let sec = secs.trim().parse::<f64>().unwrap_or(0.0);
        return m + sec / 60.0;
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Full classification for one team's players in one game: starters from
/// their official codes, bench from stat shape, then the rebalancing pass.
pub fn classify_team(players: &mut [BoxScorePlayer], params: &RedistributionParams) {
    assign_starter_buckets(players);
    assign_bench_buckets(players);
    redistribute_bench(players, params);
}

/// Starters with one of the five exact codes keep it, always. Generic "G"
/// and "F" are disambiguated by which slot another starter already fills,
/// falling back to stat thresholds when context doesn't decide.
pub fn assign_starter_buckets(players: &mut [BoxScorePlayer]) {
    // Exact codes first so the context-fill pass can see them.
    for p in players.iter_mut().filter(|p| p.starter) {
        if let Some(bucket) = Bucket::from_code(&p.start_pos) {
            p.bucket = Some(bucket);
        }
    }
    for idx in 0..players.len() {
        if !players[idx].starter || players[idx].bucket.is_some() {
            continue;
        }
        let code = players[idx].start_pos.trim().to_ascii_uppercase();
        let filled = |bucket: Bucket| {
            players
                .iter()
                .enumerate()
                .any(|(i, p)| i != idx && p.starter && p.bucket == Some(bucket))
        };
        let assigned = match code.as_str() {
            "G" => Some(match (filled(Bucket::PG), filled(Bucket::SG)) {
                (true, false) => Bucket::SG,
                (false, true) => Bucket::PG,
                _ => {
                    if players[idx].ast >= 5.0 {
                        Bucket::PG
                    } else {
                        Bucket::SG
                    }
                }
            }),
            "F" => Some(match (filled(Bucket::SF), filled(Bucket::PF)) {
                (true, false) => Bucket::PF,
                (false, true) => Bucket::SF,
                _ => {
                    if players[idx].reb >= 8.0 || players[idx].blk >= 2.0 {
                        Bucket::PF
                    } else {
                        Bucket::SF
                    }
                }
            }),
            // No resolvable code: leave unassigned rather than guess.
            _ => None,
        };
        players[idx].bucket = assigned;
    }
}

/// Stat-shape classification for bench players (the feed carries no
/// official position for them).
pub fn assign_bench_buckets(players: &mut [BoxScorePlayer]) {
    let mut guards: Vec<usize> = Vec::new();
    let mut forwards: Vec<usize> = Vec::new();
    for (idx, p) in players.iter_mut().enumerate() {
        if p.starter {
            continue;
        }
        if p.reb >= 10.0 || p.blk >= 2.0 {
            p.bucket = Some(Bucket::C);
        } else if p.ast >= 3.0 || p.reb < 6.0 {
            guards.push(idx);
        } else {
            forwards.push(idx);
        }
    }
    // Top distributor runs point, everyone else is the two.
    guards.sort_by(|a, b| {
        players[*b]
            .ast
            .partial_cmp(&players[*a].ast)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (rank, idx) in guards.iter().enumerate() {
        players[*idx].bucket = Some(if rank == 0 { Bucket::PG } else { Bucket::SG });
    }
    forwards.sort_by(|a, b| {
        players[*b]
            .reb
            .partial_cmp(&players[*a].reb)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (rank, idx) in forwards.iter().enumerate() {
        players[*idx].bucket = Some(if rank == 0 { Bucket::PF } else { Bucket::SF });
    }
}

/// Per-bucket ceilings for a bench of this size. Centers are never capped:
/// a heavy lineup genuinely plays three bigs and forcing them into forward
/// buckets skews the DvP totals worse than overcounting centers.
fn bucket_targets(bench_size: usize, params: &RedistributionParams) -> [usize; 5] {
    let cap = if bench_size <= params.small_bench {
        1
    } else if bench_size <= params.medium_bench {
        2
    } else {
        3
    };
    let mut targets = [cap, cap, cap, cap, usize::MAX];
    if bench_size >= 6 {
        let guard_total = (bench_size as f64 * params.guard_share).round() as usize;
        let forward_total = bench_size.saturating_sub(guard_total);
        let pg = guard_total.div_ceil(2);
        let sg = guard_total - pg;
        let sf = forward_total.div_ceil(2);
        let pf = forward_total - sf;
        targets[0] = pg.min(cap).max(1);
        targets[1] = sg.min(cap).max(1);
        targets[2] = sf.min(cap).max(1);
        targets[3] = pf.min(cap).max(1);
    }
    targets
}

fn bucket_index(bucket: Bucket) -> usize {
    ALL_BUCKETS.iter().position(|b| *b == bucket).unwrap_or(4)
}

/// Legal single-step moves: within the guard pair, within the forward pair,
/// plus the fixed cross edges PG->SG, SG->SF, SF->PF, PF->C. Centers never
/// move.
fn compatible_destinations(from: Bucket) -> &'static [Bucket] {
    match from {
        Bucket::PG => &[Bucket::SG],
        Bucket::SG => &[Bucket::PG, Bucket::SF],
        Bucket::SF => &[Bucket::PF],
        Bucket::PF => &[Bucket::SF, Bucket::C],
        Bucket::C => &[],
    }
}

/// Rebalances bench bucket assignments toward the ideal distribution.
/// No-op for benches of three or fewer. Starters are never touched.
///
/// Targets are recomputed from scratch each iteration (cheap at this size
/// and keeps repeated application idempotent); ties break toward the
/// lowest-minutes player.
pub fn redistribute_bench(players: &mut [BoxScorePlayer], params: &RedistributionParams) {
    let bench: Vec<usize> = players
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.starter && p.bucket.is_some())
        .map(|(idx, _)| idx)
        .collect();
    if bench.len() <= 3 {
        return;
    }

    for _ in 0..params.max_iterations {
        let targets = bucket_targets(bench.len(), params);
        let mut counts = [0usize; 5];
        for idx in &bench {
            if let Some(bucket) = players[*idx].bucket {
                counts[bucket_index(bucket)] += 1;
            }
        }

        if !make_compatible_move(players, &bench, &counts, &targets)
            && !push_along_chain(players, &bench, &counts, &targets)
            && !make_cross_divide_move(players, &bench, &counts, &targets)
        {
            break;
        }
    }
}

fn make_compatible_move(
    players: &mut [BoxScorePlayer],
    bench: &[usize],
    counts: &[usize; 5],
    targets: &[usize; 5],
) -> bool {
    for from in ALL_BUCKETS {
        let fi = bucket_index(from);
        if counts[fi] <= targets[fi] {
            continue;
        }
        for to in compatible_destinations(from) {
            let ti = bucket_index(*to);
            if counts[ti] >= targets[ti] {
                continue;
            }
            if let Some(idx) = lowest_minutes_in(players, bench, from) {
                players[idx].bucket = Some(*to);
                return true;
            }
        }
    }
    false
}

/// The cross edges form a chain that ends at the uncapped center bucket.
/// When an over-target bucket has no under-target destination left, push one
/// player a step down the chain anyway; overflow drains toward C over the
/// following iterations instead of stalling.
fn push_along_chain(
    players: &mut [BoxScorePlayer],
    bench: &[usize],
    counts: &[usize; 5],
    targets: &[usize; 5],
) -> bool {
    for (from, to) in [
        (Bucket::PF, Bucket::C),
        (Bucket::SF, Bucket::PF),
        (Bucket::SG, Bucket::SF),
        (Bucket::PG, Bucket::SG),
    ] {
        let fi = bucket_index(from);
        if counts[fi] <= targets[fi] {
            continue;
        }
        if let Some(idx) = lowest_minutes_in(players, bench, from) {
            players[idx].bucket = Some(to);
            return true;
        }
    }
    false
}

/// Last resort: when one half of the guard or forward pair outnumbers the
/// other by the imbalance threshold, a move across the guard/forward divide
/// is allowed into any bucket still under target.
fn make_cross_divide_move(
    players: &mut [BoxScorePlayer],
    bench: &[usize],
    counts: &[usize; 5],
    targets: &[usize; 5],
) -> bool {
    let pairs = [(Bucket::SF, Bucket::PF), (Bucket::PG, Bucket::SG)];
    for (a, b) in pairs {
        let (ai, bi) = (bucket_index(a), bucket_index(b));
        let from = if counts[ai] >= counts[bi] + EXTREME_IMBALANCE {
            a
        } else if counts[bi] >= counts[ai] + EXTREME_IMBALANCE {
            b
        } else {
            continue;
        };
        for to in ALL_BUCKETS {
            let ti = bucket_index(to);
            if to == from || to == Bucket::C || counts[ti] >= targets[ti] {
                continue;
            }
            if let Some(idx) = lowest_minutes_in(players, bench, from) {
                players[idx].bucket = Some(to);
                return true;
            }
        }
    }
    false
}

fn lowest_minutes_in(players: &[BoxScorePlayer], bench: &[usize], bucket: Bucket) -> Option<usize> {
    bench
        .iter()
        .copied()
        .filter(|idx| players[*idx].bucket == Some(bucket))
        .min_by(|a, b| {
            players[*a]
                .minutes
                .partial_cmp(&players[*b].minutes)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench_player(name: &str, ast: f64, reb: f64, blk: f64, minutes: f64) -> BoxScorePlayer {
        BoxScorePlayer {
            name: name.to_string(),
            starter: false,
            start_pos: String::new(),
            minutes,
            pts: 0.0,
            reb,
            ast,
            blk,
            bucket: None,
        }
    }

    fn starter(name: &str, code: &str, ast: f64, reb: f64, blk: f64) -> BoxScorePlayer {
        BoxScorePlayer {
            name: name.to_string(),
            starter: true,
            start_pos: code.to_string(),
            minutes: 30.0,
            pts: 10.0,
            reb,
            ast,
            blk,
            bucket: None,
        }
    }

    #[test]
    fn exact_starter_codes_are_kept() {
        let mut players = vec![
            starter("a", "PG", 0.0, 0.0, 0.0),
            starter("b", "C", 0.0, 12.0, 3.0),
        ];
        assign_starter_buckets(&mut players);
        assert_eq!(players[0].bucket, Some(Bucket::PG));
        assert_eq!(players[1].bucket, Some(Bucket::C));
    }

    #[test]
    fn generic_guard_uses_context_fill() {
        let mut players = vec![
            starter("pg", "PG", 8.0, 2.0, 0.0),
            starter("g", "G", 1.0, 2.0, 0.0),
        ];
        assign_starter_buckets(&mut players);
        assert_eq!(players[1].bucket, Some(Bucket::SG));
    }

    #[test]
    fn generic_guard_falls_back_to_assist_threshold() {
        let mut players = vec![
            starter("g1", "G", 6.0, 2.0, 0.0),
            starter("g2", "G", 1.0, 2.0, 0.0),
        ];
        assign_starter_buckets(&mut players);
        // Neither PG nor SG filled when g1 resolves: threshold applies.
        assert_eq!(players[0].bucket, Some(Bucket::PG));
        // By g2's turn PG is filled, SG open: context fill.
        assert_eq!(players[1].bucket, Some(Bucket::SG));
    }

    #[test]
    fn generic_forward_thresholds() {
        let mut players = vec![
            starter("f1", "F", 1.0, 9.0, 0.0),
            starter("f2", "F", 1.0, 3.0, 0.0),
        ];
        assign_starter_buckets(&mut players);
        assert_eq!(players[0].bucket, Some(Bucket::PF));
        assert_eq!(players[1].bucket, Some(Bucket::SF));
    }

    #[test]
    fn unknown_starter_code_stays_unassigned() {
        let mut players = vec![starter("x", "", 1.0, 1.0, 0.0)];
        assign_starter_buckets(&mut players);
        assert_eq!(players[0].bucket, None);
    }

    #[test]
    fn three_man_bench_splits_by_stat_shape() {
        let mut players = vec![
            bench_player("A", 6.0, 2.0, 0.0, 20.0),
            bench_player("B", 1.0, 9.0, 0.0, 15.0),
            bench_player("C", 2.0, 3.0, 0.0, 10.0),
        ];
        classify_team(&mut players, &RedistributionParams::default());
        // A: guard candidate with top assists -> PG.
        assert_eq!(players[0].bucket, Some(Bucket::PG));
        // B: 9 rebounds, no assists -> forward candidate, top rebounds -> PF.
        assert_eq!(players[1].bucket, Some(Bucket::PF));
        // C: low rebounds -> guard candidate behind A -> SG.
        assert_eq!(players[2].bucket, Some(Bucket::SG));
    }

    #[test]
    fn small_bench_is_never_rebalanced() {
        let mut players = vec![
            bench_player("a", 4.0, 1.0, 0.0, 10.0),
            bench_player("b", 3.0, 1.0, 0.0, 12.0),
            bench_player("c", 3.0, 1.0, 0.0, 14.0),
        ];
        assign_bench_buckets(&mut players);
        let before: Vec<_> = players.iter().map(|p| p.bucket).collect();
        redistribute_bench(&mut players, &RedistributionParams::default());
        let after: Vec<_> = players.iter().map(|p| p.bucket).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn starters_survive_rebalancing_untouched() {
        let mut players = vec![
            starter("s1", "PG", 7.0, 2.0, 0.0),
            starter("s2", "SG", 2.0, 3.0, 0.0),
            starter("s3", "SF", 1.0, 5.0, 0.0),
            starter("s4", "PF", 1.0, 8.0, 1.0),
            starter("s5", "C", 0.0, 11.0, 2.0),
        ];
        for i in 0..7 {
            players.push(bench_player(&format!("b{i}"), 4.0, 1.0, 0.0, 5.0 + i as f64));
        }
        classify_team(&mut players, &RedistributionParams::default());
        assert_eq!(players[0].bucket, Some(Bucket::PG));
        assert_eq!(players[1].bucket, Some(Bucket::SG));
        assert_eq!(players[2].bucket, Some(Bucket::SF));
        assert_eq!(players[3].bucket, Some(Bucket::PF));
        assert_eq!(players[4].bucket, Some(Bucket::C));
    }

    #[test]
    fn big_bench_respects_targets() {
        // Seven guard-shaped players all land in PG/SG before rebalancing.
        let mut players: Vec<BoxScorePlayer> = (0..7)
            .map(|i| bench_player(&format!("g{i}"), 4.0 + i as f64, 1.0, 0.0, 10.0 + i as f64))
            .collect();
        let params = RedistributionParams::default();
        assign_bench_buckets(&mut players);
        redistribute_bench(&mut players, &params);

        let targets = bucket_targets(7, &params);
        let mut counts = [0usize; 5];
        for p in &players {
            counts[bucket_index(p.bucket.expect("assigned"))] += 1;
        }
        for i in 0..4 {
            assert!(
                counts[i] <= targets[i],
                "bucket {} over target: {} > {}",
                ALL_BUCKETS[i].label(),
                counts[i],
                targets[i]
            );
        }
    }

    #[test]
    fn rebalancing_is_idempotent() {
        let mut players: Vec<BoxScorePlayer> = (0..8)
            .map(|i| bench_player(&format!("p{i}"), (i % 5) as f64, (i % 7) as f64, 0.0, i as f64))
            .collect();
        let params = RedistributionParams::default();
        assign_bench_buckets(&mut players);
        redistribute_bench(&mut players, &params);
        let first: Vec<_> = players.iter().map(|p| p.bucket).collect();
        redistribute_bench(&mut players, &params);
        let second: Vec<_> = players.iter().map(|p| p.bucket).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn minutes_parse_is_lenient() {
        assert!((parse_minutes("34:30") - 34.5).abs() < 1e-9);
        assert!((parse_minutes("18") - 18.0).abs() < 1e-9);
        assert_eq!(parse_minutes(""), 0.0);
        assert_eq!(parse_minutes("DNP"), 0.0);
    }
}

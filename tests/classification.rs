use std::fs;
use std::path::PathBuf;

use stattrackr::dvp::{DepthChartMap, Metric, aggregate_opponent_game};
use stattrackr::positions::{
    BoxScorePlayer, Bucket, RedistributionParams, classify_team,
};
use stattrackr::stats_api::{StatsResponse, parse_boxscore_rows};

const MIL: i64 = 1610612749;
const BOS: i64 = 1610612738;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_team(team_id: i64) -> Vec<BoxScorePlayer> {
    let resp: StatsResponse =
        serde_json::from_str(&read_fixture("boxscore.json")).expect("fixture should decode");
    parse_boxscore_rows(&resp)
        .iter()
        .filter(|r| r.team_id == team_id)
        .map(|r| r.to_player())
        .collect()
}

fn bucket_of(players: &[BoxScorePlayer], name: &str) -> Option<Bucket> {
    players.iter().find(|p| p.name == name).and_then(|p| p.bucket)
}

#[test]
fn classifies_a_full_lineup() {
    let mut players = fixture_team(MIL);
    classify_team(&mut players, &RedistributionParams::default());

    // Starters: exact C, generic F/F and G/G resolved by stats and context.
    assert_eq!(bucket_of(&players, "Brook Lopez"), Some(Bucket::C));
    assert_eq!(bucket_of(&players, "Giannis Antetokounmpo"), Some(Bucket::PF));
    assert_eq!(bucket_of(&players, "Khris Middleton"), Some(Bucket::SF));
    assert_eq!(bucket_of(&players, "Damian Lillard"), Some(Bucket::PG));
    assert_eq!(bucket_of(&players, "Gary Trent Jr."), Some(Bucket::SG));

    // Five-man bench rebalances to one player per bucket.
    assert_eq!(bucket_of(&players, "Andre Jackson Jr."), Some(Bucket::PG));
    assert_eq!(bucket_of(&players, "AJ Green"), Some(Bucket::SG));
    assert_eq!(bucket_of(&players, "Pat Connaughton"), Some(Bucket::SF));
    assert_eq!(bucket_of(&players, "Bobby Portis"), Some(Bucket::PF));
}

#[test]
fn three_man_bench_keeps_stat_shape_assignments() {
    let mut players = fixture_team(BOS);
    classify_team(&mut players, &RedistributionParams::default());

    assert_eq!(bucket_of(&players, "Jrue Holiday"), Some(Bucket::PG));
    assert_eq!(bucket_of(&players, "Derrick White"), Some(Bucket::SG));
    assert_eq!(bucket_of(&players, "Jayson Tatum"), Some(Bucket::PF));
    assert_eq!(bucket_of(&players, "Jaylen Brown"), Some(Bucket::SF));
    // Bench of three is below the rebalancing floor.
    assert_eq!(bucket_of(&players, "Payton Pritchard"), Some(Bucket::PG));
    assert_eq!(bucket_of(&players, "Sam Hauser"), Some(Bucket::SG));
    assert_eq!(bucket_of(&players, "Luke Kornet"), Some(Bucket::C));
}

#[test]
fn aggregated_buckets_cover_the_whole_opponent_score() {
    let resp: StatsResponse =
        serde_json::from_str(&read_fixture("boxscore.json")).expect("fixture should decode");
    let rows = parse_boxscore_rows(&resp);

    // From Boston's side: what they allowed to Milwaukee.
    let game = aggregate_opponent_game(
        &rows,
        BOS,
        &DepthChartMap::new(),
        Metric::Pts,
        &RedistributionParams::default(),
    )
    .expect("game aggregates");

    assert_eq!(game.opponent, "MIL");
    assert!(!game.lineup_verified);
    assert!((game.buckets.iter().sum::<f64>() - 137.0).abs() < 1e-9);
    // PG bucket: Lillard 28 plus the bench point guard's 2.
    assert!((game.buckets[0] - 30.0).abs() < 1e-9);
    // PF bucket: Antetokounmpo 34 plus Portis 13.
    assert!((game.buckets[3] - 47.0).abs() < 1e-9);
}

#[test]
fn depth_chart_pins_beat_the_fixture_heuristic() {
    let resp: StatsResponse =
        serde_json::from_str(&read_fixture("boxscore.json")).expect("fixture should decode");
    let rows = parse_boxscore_rows(&resp);

    // The heuristic sends Portis to PF; the roster lists him at center.
    let mut depth = DepthChartMap::new();
    depth.insert("bobby portis".to_string(), Bucket::C);
    let game = aggregate_opponent_game(
        &rows,
        BOS,
        &depth,
        Metric::Pts,
        &RedistributionParams::default(),
    )
    .expect("game aggregates");

    assert!(game.lineup_verified);
    assert!((game.buckets[3] - 34.0).abs() < 1e-9); // PF loses Portis
    assert!((game.buckets[4] - 27.0).abs() < 1e-9); // C gains his 13
}

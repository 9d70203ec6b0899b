use std::fs;
use std::path::PathBuf;

use stattrackr::dvp::Metric;
use stattrackr::props_api::parse_props_blob;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_props_fixture() {
    let lines = parse_props_blob(&read_fixture("props.json")).expect("blob parses");
    // Six raw rows, one with an untracked stat key.
    assert_eq!(lines.len(), 5);
}

#[test]
fn bookmakers_come_out_in_sorted_order() {
    let lines = parse_props_blob(&read_fixture("props.json")).expect("blob parses");
    assert_eq!(lines[0].bookmaker, "draftkings");
    assert_eq!(lines[0].player, "Giannis Antetokounmpo");
    assert_eq!(lines[0].stat, Metric::Pts);
    assert!((lines[0].line - 32.5).abs() < 1e-9);
    assert!(lines.iter().rev().take(3).all(|l| l.bookmaker == "fanduel"));
}

#[test]
fn odds_fields_are_optional() {
    let lines = parse_props_blob(&read_fixture("props.json")).expect("blob parses");
    let tatum = lines
        .iter()
        .find(|l| l.player == "Jayson Tatum")
        .expect("tatum line");
    assert_eq!(tatum.stat, Metric::Fg3m);
    assert_eq!(tatum.over_odds, None);
    assert_eq!(tatum.under_odds, None);

    let lillard = lines
        .iter()
        .find(|l| l.player == "Damian Lillard" && l.stat == Metric::Ast)
        .expect("lillard line");
    assert_eq!(lillard.over_odds, Some(-120));
    assert_eq!(lillard.under_odds, Some(100));
}

#[test]
fn garbage_blob_is_an_error() {
    assert!(parse_props_blob("{not json").is_err());
}

use serde_json::{Value, json};

use stattrackr::cache_store::{CacheStore, DEFAULT_TTL_MINUTES};

#[test]
fn absent_key_is_a_miss() {
    let store = CacheStore::open_in_memory().expect("store");
    assert!(store.get("nothing_here").expect("query").is_none());
}

#[test]
fn upsert_then_get_round_trips() {
    let store = CacheStore::open_in_memory().expect("store");
    let payload = json!({"team": "MIL", "rank": 3});
    store
        .upsert("dvp_pts_MIL_2025-26", "dvp", &payload, DEFAULT_TTL_MINUTES)
        .expect("upsert");
    let entry = store
        .get("dvp_pts_MIL_2025-26")
        .expect("query")
        .expect("hit");
    assert_eq!(entry.cache_type, "dvp");
    assert_eq!(entry.data, payload);
    assert!(entry.expires_at > entry.created_at);
}

#[test]
fn expired_row_reads_as_miss_and_prunes() {
    let store = CacheStore::open_in_memory().expect("store");
    store
        .upsert("stale", "dvp", &json!({"old": true}), -5)
        .expect("upsert");
    assert!(store.get("stale").expect("query").is_none());
    assert_eq!(store.prune_expired().expect("prune"), 1);
}

#[test]
fn second_upsert_replaces_payload_but_keeps_created_at() {
    let store = CacheStore::open_in_memory().expect("store");
    store
        .upsert("key", "dvp", &json!({"v": 1}), DEFAULT_TTL_MINUTES)
        .expect("first");
    let first = store.get("key").expect("query").expect("hit");
    store
        .upsert("key", "dvp", &json!({"v": 2}), DEFAULT_TTL_MINUTES)
        .expect("second");
    let second = store.get("key").expect("query").expect("hit");
    assert_eq!(second.data, json!({"v": 2}));
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn merged_upserts_accumulate_player_maps() {
    let store = CacheStore::open_in_memory().expect("store");
    let key = "player_props_2025-26";

    let merge_in = |addition: Value| {
        move |current: Option<&Value>| {
            let mut players = current
                .and_then(|v| v.get("players"))
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            for (name, payload) in addition.as_object().expect("object") {
                players.insert(name.clone(), payload.clone());
            }
            json!({"players": players})
        }
    };

    store
        .upsert_merged(key, "props", DEFAULT_TTL_MINUTES, merge_in(json!({"A": {"line": 24.5}})))
        .expect("shard one");
    store
        .upsert_merged(key, "props", DEFAULT_TTL_MINUTES, merge_in(json!({"B": {"line": 7.5}})))
        .expect("shard two");

    let entry = store.get(key).expect("query").expect("hit");
    let players = entry.data["players"].as_object().expect("players map");
    assert_eq!(players.len(), 2);
    assert_eq!(players["A"]["line"], 24.5);
    assert_eq!(players["B"]["line"], 7.5);
}

#[test]
fn keys_of_type_excludes_expired_and_sorts() {
    let store = CacheStore::open_in_memory().expect("store");
    store
        .upsert("dvp_pts_MIL_2025-26", "dvp", &json!(1), DEFAULT_TTL_MINUTES)
        .expect("upsert");
    store
        .upsert("dvp_pts_BOS_2025-26", "dvp", &json!(1), DEFAULT_TTL_MINUTES)
        .expect("upsert");
    store
        .upsert("dvp_pts_NYK_2025-26", "dvp", &json!(1), -1)
        .expect("upsert");
    store
        .upsert("pace_ranks_2025-26", "pace", &json!(1), DEFAULT_TTL_MINUTES)
        .expect("upsert");

    let keys = store.keys_of_type("dvp").expect("keys");
    assert_eq!(keys, ["dvp_pts_BOS_2025-26", "dvp_pts_MIL_2025-26"]);
}

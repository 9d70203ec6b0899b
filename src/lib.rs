pub mod aggregator_api;
pub mod cache_store;
pub mod config;
pub mod dvp;
pub mod dvp_store;
pub mod embedded_json;
pub mod http_client;
pub mod pace;
pub mod player_ids;
pub mod positions;
pub mod props_api;
pub mod ranks;
pub mod retry;
pub mod stats_api;

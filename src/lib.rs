pub mod anomaly;
pub mod api;
pub mod config;
pub mod graph;
pub mod ingest;
pub mod monitor;
pub mod pipeline;
pub mod risk;
pub mod signals;
pub mod stats;
pub mod sync;
pub mod wallet;

pub mod engine;
pub mod features;
pub mod forest;
pub mod types;

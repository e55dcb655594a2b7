pub mod normalizer;
pub mod source;
pub mod types;

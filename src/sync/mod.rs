pub mod finder;
pub mod report;
pub mod types;

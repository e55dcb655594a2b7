pub mod clusterer;
pub mod features;

pub mod aggregator;
pub mod params;
pub mod submitter;

pub mod admission;
pub mod analytics;
pub mod cache_client;
pub mod cbor;
pub mod config;
pub mod error;
pub mod extractor;
pub mod frontier;
pub mod logging;
pub mod politeness;
pub mod report;
pub mod scraper;
pub mod urlcanon;
pub mod worker;

//! A library for crawling job listings, built on a crawler driven by the trait `Spider`.

pub mod crawler;
pub mod dataset;
pub mod fetch;
pub mod headhunter;
mod spider;
mod user_agent;

pub use crawler::{Crawler, CrawlerOptions};
pub use dataset::{Dataset, DatasetSink};
pub use spider::{CrawlRequest, Spider};
pub use user_agent::UserAgents;

//! Crawling of HeadHunter (`*.hh.<tld>`) job listings.

pub mod extract;
mod location;
mod record;
mod spider;

pub use location::{CountryInfo, LocationError, LocationTable};
pub use record::JobRecord;
pub use spider::{HeadHunterOptions, HeadHunterSpider, HhRequest, ScrapeError, Target};

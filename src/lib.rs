//! Turbo.az listing extraction behind MCP tools.
//!
//! The site renders its search form and results with JavaScript and blocks
//! plain HTTP clients, so extraction drives a real headless browser: filter
//! criteria are resolved against the site's dropdown widgets to recover
//! internal numeric ids, a canonical search URL is built over the site's
//! full parameter schema, and the rendered markup is parsed into typed
//! records with per-field fallbacks.

pub mod error;
pub mod mcp;
pub mod models;
pub mod photos;
pub mod scrapers;

pub use error::{ScrapeError, ScrapeResult};
pub use models::{CarDetail, CarSummary, DropdownOption, MakesReport, SearchReport};
pub use scrapers::query::FilterCriteria;
pub use scrapers::TurboScraper;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (value, label) pair harvested from a site dropdown widget.
///
/// `value` is the opaque numeric identifier the site's query parameters
/// require in place of the human-readable label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
}

/// Fields visible on a single search-results row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarSummary {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub title: String,
    /// Display string as rendered on the page, currency included.
    pub price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Full field set visible on a listing's own page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarDetail {
    pub url: String,
    pub title: String,
    pub price: String,
    pub images: Vec<String>,
    pub specs: BTreeMap<String, String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    pub phones: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posted_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub views: Option<String>,
}

/// Outcome of one successful search invocation.
///
/// `total_count` is the site-reported amount and may exceed
/// `returned_count`; `search_url` is the canonical URL the results were
/// extracted from.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub total_count: String,
    pub returned_count: usize,
    pub search_url: String,
    pub results: Vec<CarSummary>,
    pub scraped_at: DateTime<Utc>,
}

/// Outcome of a makes/models catalog query.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MakesReport {
    AllMakes { makes: Vec<String> },
    ModelsForMake { make: String, models: Vec<String> },
}

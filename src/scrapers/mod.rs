pub mod dropdown;
pub mod extract;
pub mod query;
pub mod session;

use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{CarDetail, MakesReport, SearchReport};
use chrono::Utc;
use dropdown::{CatalogSource, LiveCatalog};
use query::{detail_url, FilterCriteria, SearchQuery};
use scraper::Html;
use session::{RenderSession, WIDGET_TIMEOUT};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Stages a search passes through, in order. Recorded so callers and tests
/// can assert which lookups actually ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStage {
    MakeLookup,
    ModelLookup,
    QueryBuilt,
    PageLoaded,
    Extracted,
}

/// Identifiers recovered from the site's dropdowns for one criteria set.
#[derive(Debug, Clone)]
pub struct ResolvedFilters {
    pub make_id: Option<String>,
    pub model_id: Option<String>,
    pub stages: Vec<SearchStage>,
}

fn trimmed(field: Option<&str>) -> Option<&str> {
    field.map(str::trim).filter(|s| !s.is_empty())
}

/// Resolve free-text make/model names to the site's internal ids.
///
/// A make with zero matches is terminal: the search is aborted before any
/// result page loads. A model miss is not, because the site still returns
/// valid results without the model filter. Model resolution requires a
/// make; a model given without one is ignored.
pub fn resolve_filters(
    catalog: &mut dyn CatalogSource,
    criteria: &FilterCriteria,
) -> ScrapeResult<ResolvedFilters> {
    let mut stages = Vec::new();
    let mut model_id = None;

    let Some(make) = trimmed(criteria.make.as_deref()) else {
        return Ok(ResolvedFilters {
            make_id: None,
            model_id: None,
            stages,
        });
    };

    stages.push(SearchStage::MakeLookup);
    let make_options = catalog.make_options()?;
    let Some(make_id) = dropdown::resolve(&make_options, make).map(str::to_string) else {
        let sample: Vec<&str> = make_options
            .iter()
            .take(20)
            .map(|o| o.label.as_str())
            .collect();
        warn!(make, ?sample, "make not found among dropdown options");
        return Err(ScrapeError::MakeNotFound {
            name: make.to_string(),
        });
    };

    if let Some(model) = trimmed(criteria.model.as_deref()) {
        stages.push(SearchStage::ModelLookup);
        let model_options = catalog.model_options(&make_id)?;
        model_id = dropdown::resolve(&model_options, model).map(str::to_string);
        if model_id.is_none() {
            info!(model, "model not found, searching without model filter");
        }
    }

    Ok(ResolvedFilters {
        make_id: Some(make_id),
        model_id,
        stages,
    })
}

fn search_blocking(
    session: &mut RenderSession,
    criteria: &FilterCriteria,
) -> ScrapeResult<SearchReport> {
    let mut resolved = {
        let mut catalog = LiveCatalog::new(session);
        resolve_filters(&mut catalog, criteria)?
    };

    let query = SearchQuery::build(
        criteria,
        resolved.make_id.as_deref(),
        resolved.model_id.as_deref(),
    );
    resolved.stages.push(SearchStage::QueryBuilt);
    info!(url = %query.url, "searching");

    session.navigate(&query.url)?;
    session.wait_for(".products-i", WIDGET_TIMEOUT)?;
    resolved.stages.push(SearchStage::PageLoaded);

    let doc = Html::parse_document(&session.page_html()?);
    let results = extract::extract_summaries(&doc, criteria.limit);
    let total_count = extract::extract_total_count(&doc, results.len());
    resolved.stages.push(SearchStage::Extracted);
    info!(
        returned = results.len(),
        %total_count,
        stages = ?resolved.stages,
        "search finished"
    );

    Ok(SearchReport {
        total_count,
        returned_count: results.len(),
        search_url: query.url,
        results,
        scraped_at: Utc::now(),
    })
}

fn detail_blocking(session: &mut RenderSession, url: &str) -> ScrapeResult<CarDetail> {
    info!(%url, "fetching details");
    session.navigate(url)?;
    session.wait_for(".product", WIDGET_TIMEOUT)?;
    let doc = Html::parse_document(&session.page_html()?);
    Ok(extract::extract_detail(&doc, url))
}

fn makes_blocking(session: &mut RenderSession, make: Option<&str>) -> ScrapeResult<MakesReport> {
    let mut catalog = LiveCatalog::new(session);
    match trimmed(make) {
        Some(make) => {
            let make_options = catalog.make_options()?;
            let make_id = dropdown::resolve(&make_options, make)
                .map(str::to_string)
                .ok_or_else(|| ScrapeError::MakeNotFound {
                    name: make.to_string(),
                })?;
            let models = catalog
                .model_options(&make_id)?
                .into_iter()
                .map(|o| o.label)
                .collect();
            Ok(MakesReport::ModelsForMake {
                make: make.to_string(),
                models,
            })
        }
        None => {
            let makes = catalog
                .make_options()?
                .into_iter()
                .map(|o| o.label)
                .collect();
            Ok(MakesReport::AllMakes { makes })
        }
    }
}

/// Turbo.az scraper: one browser session, one operation at a time.
///
/// Browser work is blocking process/network I/O; every public operation
/// offloads it to a dedicated worker thread so the calling protocol layer
/// stays responsive. The session mutex serializes operations by
/// construction.
pub struct TurboScraper {
    session: Arc<Mutex<RenderSession>>,
}

impl TurboScraper {
    pub fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(RenderSession::new())),
        }
    }

    async fn run_blocking<T, F>(&self, op: F) -> ScrapeResult<T>
    where
        F: FnOnce(&mut RenderSession) -> ScrapeResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = session.lock().unwrap_or_else(|e| e.into_inner());
            op(&mut guard)
        })
        .await
        .map_err(|e| ScrapeError::Unclassified(format!("scrape worker failed: {e}")))?
    }

    /// Search listings matching `criteria`, resolving make/model names to
    /// the site's internal ids first.
    pub async fn search_cars(&self, criteria: FilterCriteria) -> ScrapeResult<SearchReport> {
        self.run_blocking(move |session| search_blocking(session, &criteria))
            .await
    }

    /// Fetch the full record of one listing, by bare id or detail-page URL.
    pub async fn get_car_details(&self, listing: &str) -> ScrapeResult<CarDetail> {
        let url = detail_url(listing.trim());
        self.run_blocking(move |session| detail_blocking(session, &url))
            .await
    }

    /// List all makes, or the models of one make.
    pub async fn get_makes_models(&self, make: Option<String>) -> ScrapeResult<MakesReport> {
        self.run_blocking(move |session| makes_blocking(session, make.as_deref()))
            .await
    }

    /// Newest/popular/vip listings. The category picks which variant URL is
    /// logged; results come from an unfiltered search.
    pub async fn get_trending(&self, category: &str, limit: usize) -> ScrapeResult<SearchReport> {
        let variant_url = match category {
            "vip" => format!("{}/autos?q[extras][]=vip", query::BASE_URL),
            "popular" => format!("{}/autos?order=view_count", query::BASE_URL),
            _ => format!("{}/autos", query::BASE_URL),
        };
        info!(category, %variant_url, "trending request");
        let criteria = FilterCriteria {
            limit,
            ..Default::default()
        };
        self.search_cars(criteria).await
    }

    /// Tear down the browser session. Safe when none was ever created; the
    /// next operation lazily relaunches.
    pub async fn close(&self) {
        let _ = self
            .run_blocking(|session| {
                session.close();
                Ok(())
            })
            .await;
    }
}

impl Default for TurboScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DropdownOption;

    fn opt(value: &str, label: &str) -> DropdownOption {
        DropdownOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    /// Catalog fake that records which lookups ran and with what make id.
    struct FakeCatalog {
        makes: Vec<DropdownOption>,
        models: Vec<DropdownOption>,
        make_calls: usize,
        model_calls: Vec<String>,
    }

    impl FakeCatalog {
        fn new(makes: Vec<DropdownOption>, models: Vec<DropdownOption>) -> Self {
            Self {
                makes,
                models,
                make_calls: 0,
                model_calls: Vec::new(),
            }
        }
    }

    impl CatalogSource for FakeCatalog {
        fn make_options(&mut self) -> ScrapeResult<Vec<DropdownOption>> {
            self.make_calls += 1;
            Ok(self.makes.clone())
        }

        fn model_options(&mut self, make_id: &str) -> ScrapeResult<Vec<DropdownOption>> {
            self.model_calls.push(make_id.to_string());
            Ok(self.models.clone())
        }
    }

    #[test]
    fn no_make_skips_all_lookups() {
        let mut catalog = FakeCatalog::new(vec![], vec![]);
        let resolved = resolve_filters(&mut catalog, &FilterCriteria::default()).unwrap();
        assert!(resolved.make_id.is_none());
        assert!(resolved.stages.is_empty());
        assert_eq!(catalog.make_calls, 0);
    }

    #[test]
    fn make_without_model_skips_model_lookup() {
        let mut catalog = FakeCatalog::new(vec![opt("48", "Toyota")], vec![]);
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            ..Default::default()
        };
        let resolved = resolve_filters(&mut catalog, &criteria).unwrap();
        assert_eq!(resolved.make_id.as_deref(), Some("48"));
        assert_eq!(resolved.stages, vec![SearchStage::MakeLookup]);
        assert!(catalog.model_calls.is_empty());
    }

    #[test]
    fn unresolvable_make_is_terminal_and_names_the_make() {
        let mut catalog = FakeCatalog::new(vec![opt("3", "BMW")], vec![]);
        let criteria = FilterCriteria {
            make: Some("yugo".into()),
            model: Some("45".into()),
            ..Default::default()
        };
        let err = resolve_filters(&mut catalog, &criteria).unwrap_err();
        match err {
            ScrapeError::MakeNotFound { name } => assert_eq!(name, "yugo"),
            other => panic!("expected MakeNotFound, got {other:?}"),
        }
        // terminal before any model-side interaction
        assert!(catalog.model_calls.is_empty());
    }

    #[test]
    fn model_lookup_runs_against_the_selected_make() {
        let mut catalog = FakeCatalog::new(
            vec![opt("48", "Toyota")],
            vec![opt("193", "Camry"), opt("194", "Corolla")],
        );
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            model: Some("camry".into()),
            ..Default::default()
        };
        let resolved = resolve_filters(&mut catalog, &criteria).unwrap();
        assert_eq!(resolved.make_id.as_deref(), Some("48"));
        assert_eq!(resolved.model_id.as_deref(), Some("193"));
        assert_eq!(
            resolved.stages,
            vec![SearchStage::MakeLookup, SearchStage::ModelLookup]
        );
        // the selection phase used the id the make lookup produced
        assert_eq!(catalog.model_calls, vec!["48".to_string()]);
    }

    #[test]
    fn model_miss_is_not_fatal() {
        let mut catalog = FakeCatalog::new(vec![opt("48", "Toyota")], vec![opt("194", "Corolla")]);
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            model: Some("tercel".into()),
            ..Default::default()
        };
        let resolved = resolve_filters(&mut catalog, &criteria).unwrap();
        assert_eq!(resolved.make_id.as_deref(), Some("48"));
        assert!(resolved.model_id.is_none());
    }

    #[test]
    fn model_without_make_is_ignored() {
        let mut catalog = FakeCatalog::new(vec![], vec![opt("193", "Camry")]);
        let criteria = FilterCriteria {
            model: Some("camry".into()),
            ..Default::default()
        };
        let resolved = resolve_filters(&mut catalog, &criteria).unwrap();
        assert!(resolved.model_id.is_none());
        assert!(catalog.model_calls.is_empty());
    }

    #[test]
    fn resolved_ids_produce_a_model_free_url_when_model_missing() {
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            ..Default::default()
        };
        let query = SearchQuery::build(&criteria, Some("48"), None);
        assert!(!query
            .params
            .iter()
            .any(|(k, v)| *k == "q[model][]" && !v.is_empty()));
    }
}

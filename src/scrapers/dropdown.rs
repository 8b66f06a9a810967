use crate::error::ScrapeResult;
use crate::models::DropdownOption;
use crate::scrapers::extract::first_text;
use crate::scrapers::query::BASE_URL;
use crate::scrapers::session::{RenderSession, WIDGET_TIMEOUT};
use headless_chrome::Tab;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Settle delay after an open/select click; the option list populates
/// asynchronously.
const SETTLE: Duration = Duration::from_millis(300);
const SELECT_SETTLE: Duration = Duration::from_millis(500);

/// Parse the (value, label) option rows of a site dropdown widget out of
/// captured page HTML. Reset, not-found and hidden rows are excluded; a
/// missing container yields an empty list, not an error.
pub fn parse_dropdown_options(doc: &Html, dropdown_id: &str) -> Vec<DropdownOption> {
    let container_sel =
        Selector::parse(&format!(r#".tz-dropdown[data-id="{dropdown_id}"]"#)).unwrap();
    let option_sel = Selector::parse(".tz-dropdown__list .tz-dropdown__option").unwrap();

    let Some(container) = doc.select(&container_sel).next() else {
        return Vec::new();
    };

    let mut options = Vec::new();
    for el in container.select(&option_sel) {
        let value = el.value().attr("data-val").unwrap_or("").trim();
        if value.is_empty() {
            continue;
        }
        let classes = el.value().attr("class").unwrap_or("");
        if classes.contains("tz-dropdown__option--reset")
            || classes.contains("tz-dropdown__option--not-found")
            || classes.contains("is-hidden")
        {
            continue;
        }
        // Primary label lives in a nested text node; fall back to the
        // coarser label container when the site renders without it.
        let Some(label) = first_text(
            el,
            &[".tz-dropdown__option-label .text", ".tz-dropdown__option-label"],
        ) else {
            continue;
        };
        options.push(DropdownOption {
            value: value.to_string(),
            label,
        });
    }
    options
}

/// Match a free-text query against option labels, case-insensitively.
///
/// Tie-break priority, each tier a full pass in option order: exact match,
/// label starts with `query + " "`, label starts with `query + "("`, label
/// contains the query. Site labels append qualifiers after the base name, so
/// the prefix/substring tiers keep short queries usable; the substring tier
/// is a known precision trade-off for very short queries.
pub fn resolve<'a>(options: &'a [DropdownOption], query: &str) -> Option<&'a str> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    let space_prefix = format!("{q} ");
    let paren_prefix = format!("{q}(");

    options
        .iter()
        .find(|o| o.label.to_lowercase() == q)
        .or_else(|| {
            options
                .iter()
                .find(|o| o.label.to_lowercase().starts_with(&space_prefix))
        })
        .or_else(|| {
            options
                .iter()
                .find(|o| o.label.to_lowercase().starts_with(&paren_prefix))
        })
        .or_else(|| options.iter().find(|o| o.label.to_lowercase().contains(&q)))
        .map(|o| o.value.as_str())
}

/// Click a dropdown's selected-value header to expand its option list.
/// Missing header is tolerated; the widget may already be open.
pub fn open_dropdown(tab: &Arc<Tab>, dropdown_id: &str) {
    let css = format!(r#".tz-dropdown[data-id="{dropdown_id}"] .tz-dropdown__selected"#);
    if let Ok(el) = tab.find_element(&css) {
        let _ = el.click();
    }
    thread::sleep(SETTLE);
}

/// Click the option with the given `data-val`. This is a real selection, not
/// a lookup: the site only populates dependent dropdowns (model) after it.
pub fn select_option(tab: &Arc<Tab>, dropdown_id: &str, value: &str) {
    let css = format!(
        r#".tz-dropdown[data-id="{dropdown_id}"] .tz-dropdown__option[data-val="{value}"]"#
    );
    if let Ok(el) = tab.find_element(&css) {
        let _ = el.click();
    } else {
        debug!(dropdown_id, value, "option to select not present in DOM");
    }
    thread::sleep(SELECT_SETTLE);
}

/// Open a dropdown and read its rendered option rows.
pub fn harvest_options(tab: &Arc<Tab>, dropdown_id: &str) -> ScrapeResult<Vec<DropdownOption>> {
    open_dropdown(tab, dropdown_id);
    let html = tab.get_content()?;
    Ok(parse_dropdown_options(
        &Html::parse_document(&html),
        dropdown_id,
    ))
}

/// Source of the site's make/model catalog.
///
/// `model_options` must follow a `make_options` call within the same
/// operation: the live implementation keeps the search form page loaded and
/// performs the stateful make-selection click there.
pub trait CatalogSource {
    fn make_options(&mut self) -> ScrapeResult<Vec<DropdownOption>>;
    fn model_options(&mut self, make_id: &str) -> ScrapeResult<Vec<DropdownOption>>;
}

/// Catalog backed by the live search form.
pub struct LiveCatalog<'a> {
    session: &'a mut RenderSession,
}

impl<'a> LiveCatalog<'a> {
    pub fn new(session: &'a mut RenderSession) -> Self {
        Self { session }
    }
}

impl CatalogSource for LiveCatalog<'_> {
    fn make_options(&mut self) -> ScrapeResult<Vec<DropdownOption>> {
        self.session.navigate(&format!("{BASE_URL}/autos"))?;
        self.session
            .wait_for(r#".tz-dropdown[data-id="q_make"]"#, WIDGET_TIMEOUT)?;
        thread::sleep(SETTLE);
        let tab = self.session.ensure_open()?;
        harvest_options(&tab, "q_make")
    }

    fn model_options(&mut self, make_id: &str) -> ScrapeResult<Vec<DropdownOption>> {
        let tab = self.session.ensure_open()?;
        // Two-phase protocol: select the make, then re-read the model list
        // the selection populated.
        open_dropdown(&tab, "q_make");
        select_option(&tab, "q_make", make_id);
        harvest_options(&tab, "q_model")
    }
}

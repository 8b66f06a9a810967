use crate::models::{CarDetail, CarSummary};
use crate::scrapers::query::BASE_URL;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;

/// Collected, whitespace-trimmed text of an element.
pub(crate) fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Evaluate a chain of selectors in order and return the first non-empty
/// text match.
pub(crate) fn first_text(scope: ElementRef, chain: &[&str]) -> Option<String> {
    chain.iter().find_map(|css| {
        let selector = Selector::parse(css).unwrap();
        scope
            .select(&selector)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    })
}

fn first_attr(scope: ElementRef, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).unwrap();
    scope
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn absolutize(href: &str) -> String {
    if href.starts_with('/') {
        format!("{BASE_URL}{href}")
    } else {
        href.to_string()
    }
}

/// Listing identity: final URL path segment, with variant suffixes after the
/// first `-` stripped (`.../autos/1234567-bmw-x5` -> `1234567`).
pub fn listing_id_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or("")
        .split('-')
        .next()
        .unwrap_or("")
        .to_string()
}

/// Extract at most `limit` summary records from a rendered results page, in
/// document order. A row without a recoverable link is skipped entirely;
/// every other field is independently optional.
pub fn extract_summaries(doc: &Html, limit: usize) -> Vec<CarSummary> {
    let row_sel = Selector::parse(".products-i").unwrap();
    let link_sel = Selector::parse(".products-i__link").unwrap();

    let mut results = Vec::new();
    for row in doc.select(&row_sel).take(limit) {
        let Some(href) = row
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .filter(|h| !h.trim().is_empty())
        else {
            debug!("result row without a link, skipping");
            continue;
        };
        let url = absolutize(href.trim());
        let id = listing_id_from_url(&url);

        let image = first_attr(row, ".products-i__top img", "src");
        let title =
            first_text(row, &[".products-i__name"]).unwrap_or_else(|| "N/A".to_string());
        let price =
            first_text(row, &[".products-i__price"]).unwrap_or_else(|| "N/A".to_string());

        // One comma-delimited blob: year, engine, mileage. Fewer than three
        // segments just leaves the tail fields unset.
        let mut year = None;
        let mut engine = None;
        let mut mileage = None;
        if let Some(blob) = first_text(row, &[".products-i__attributes"]) {
            let mut parts = blob
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty());
            year = parts.next();
            engine = parts.next();
            mileage = parts.next();
        }

        // City and posting date share one blob, split on the first comma only.
        let mut city = None;
        let mut date = None;
        if let Some(blob) = first_text(row, &[".products-i__datetime"]) {
            match blob.split_once(',') {
                Some((c, d)) => {
                    city = Some(c.trim().to_string());
                    date = Some(d.trim().to_string());
                }
                None => city = Some(blob),
            }
        }

        results.push(CarSummary {
            id,
            url,
            image,
            title,
            price,
            year,
            engine,
            mileage,
            city,
            date,
        });
    }
    results
}

/// Extract the full record from a rendered detail page. Every field is
/// independently fault-isolated; absent markup degrades to a sentinel or an
/// empty collection, never an error.
pub fn extract_detail(doc: &Html, url: &str) -> CarDetail {
    let root = doc.root_element();

    let title = first_text(root, &[".product-title"]).unwrap_or_else(|| "N/A".to_string());
    let price = first_text(root, &[".product-price__i--bold", ".product-price__i"])
        .unwrap_or_else(|| "N/A".to_string());

    let image_sel = Selector::parse(".product-photos__slider-top-i img").unwrap();
    let images: Vec<String> = root
        .select(&image_sel)
        .filter_map(|img| img.value().attr("src"))
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .collect();

    let prop_sel = Selector::parse(".product-properties__i").unwrap();
    let mut specs = BTreeMap::new();
    for prop in root.select(&prop_sel) {
        let name = first_text(prop, &[".product-properties__i-name"]);
        let value = first_text(prop, &[".product-properties__i-value"]);
        if let (Some(name), Some(value)) = (name, value) {
            specs.insert(name, value);
        }
    }

    let description = first_text(root, &[".product-description__content"]).unwrap_or_default();
    let seller_name = first_text(root, &[".product-owner__info-name"]);
    let city = first_text(root, &[".product-owner__info-region"]);

    let phone_sel = Selector::parse(".product-phones__i a, .js-phones-hidden-block a").unwrap();
    let phones: Vec<String> = root
        .select(&phone_sel)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    // Statistics rows carry free text; classify each by marker phrase,
    // first match per classification wins.
    let stat_sel =
        Selector::parse(".product-statistics__i .product-statistics__i-text").unwrap();
    let mut posted_date = None;
    let mut views = None;
    for stat in root.select(&stat_sel) {
        let text = text_of(stat);
        let lower = text.to_lowercase();
        if posted_date.is_none() && lower.contains("yeniləndi") {
            posted_date = Some(text);
        } else if views.is_none() && lower.contains("baxış") {
            views = Some(text);
        }
    }

    CarDetail {
        url: url.to_string(),
        title,
        price,
        images,
        specs,
        description,
        seller_name,
        city,
        phones,
        posted_date,
        views,
    }
}

/// Site-reported total: primary counter, then secondary, then the number of
/// rows actually extracted.
pub fn extract_total_count(doc: &Html, extracted_len: usize) -> String {
    first_text(
        doc.root_element(),
        &[".products-title__amount", ".products-title__count"],
    )
    .unwrap_or_else(|| extracted_len.to_string())
}

use thiserror::Error;

/// Failures that abort a single scrape operation.
///
/// Field-level extraction problems never reach this type; they are recovered
/// inside the extractor via fallbacks or omission. Whatever variant surfaces
/// here, the browser session stays reusable for the next call.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Navigation or a dynamic-content wait exceeded its bound. Carries the
    /// attempted URL so callers can retry it manually.
    #[error("page did not load in time: {url}")]
    PageLoadTimeout { url: String },

    /// The requested make matched none of the site's dropdown options.
    #[error("make not found: {name}")]
    MakeNotFound { name: String },

    /// Anything else that went wrong during a browser-driven stage.
    #[error("{0}")]
    Unclassified(String),

    #[error(transparent)]
    Browser(#[from] anyhow::Error),
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

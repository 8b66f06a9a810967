use crate::error::{ScrapeError, ScrapeResult};
use anyhow::Context;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// Upper bound for one navigation.
pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// Shorter bound for a dynamic-content wait after navigation.
pub const WIDGET_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Standard install locations, tried after the CHROME_BINARY override.
const CHROME_PATHS: [&str; 4] = [
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
];

fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(path) = env::var("CHROME_BINARY") {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
    }
    CHROME_PATHS.iter().map(PathBuf::from).find(|p| p.is_file())
}

/// One browser process and the tab all operations run in.
///
/// Lazily launched on first use, reused across calls, torn down on
/// `close()`. At most one browser per session; the temp profile directory
/// lives exactly as long as the process.
pub struct RenderSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    profile_dir: Option<TempDir>,
    current_url: Option<String>,
}

impl RenderSession {
    pub fn new() -> Self {
        Self {
            browser: None,
            tab: None,
            profile_dir: None,
            current_url: None,
        }
    }

    /// Idempotent: launches the browser on first call, afterwards returns
    /// the existing tab handle.
    pub fn ensure_open(&mut self) -> ScrapeResult<Arc<Tab>> {
        if self.tab.is_none() {
            self.launch()?;
        }
        self.tab
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ScrapeError::Unclassified("browser tab unavailable after launch".into()))
    }

    fn launch(&mut self) -> ScrapeResult<()> {
        info!("Launching headless Chrome...");

        let profile = tempfile::tempdir().context("Failed to create browser profile dir")?;
        let binary = find_chrome_binary();
        if let Some(path) = &binary {
            debug!(path = %path.display(), "using Chrome binary");
        }

        let extra_args = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-software-rasterizer"),
            OsStr::new("--lang=az-AZ"),
        ];
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .window_size(Some((1920, 1080)))
            .path(binary)
            .user_data_dir(Some(profile.path().to_path_buf()))
            .args(extra_args)
            // the session is reused across tool calls; never idle-kill it
            .idle_browser_timeout(Duration::from_secs(86_400))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(PAGE_LOAD_TIMEOUT);
        tab.set_user_agent(USER_AGENT, Some("az-AZ,az;q=0.9,en;q=0.8"), None)
            .context("Failed to set user agent")?;

        self.profile_dir = Some(profile);
        self.browser = Some(browser);
        self.tab = Some(tab);
        Ok(())
    }

    /// Load a URL. Does not wait for dynamic content; follow with
    /// [`wait_for`](Self::wait_for).
    pub fn navigate(&mut self, url: &str) -> ScrapeResult<()> {
        let tab = self.ensure_open()?;
        self.current_url = Some(url.to_string());
        debug!(%url, "navigating");
        tab.navigate_to(url).map_err(|e| self.classify(e))?;
        tab.wait_until_navigated().map_err(|e| self.classify(e))?;
        Ok(())
    }

    /// Bounded poll for one element to appear in the live DOM.
    pub fn wait_for(&mut self, css: &str, timeout: Duration) -> ScrapeResult<()> {
        let tab = self.ensure_open()?;
        tab.wait_for_element_with_custom_timeout(css, timeout)
            .map(|_| ())
            .map_err(|e| self.classify(e))
    }

    /// Capture the rendered document for pure parsing.
    pub fn page_html(&mut self) -> ScrapeResult<String> {
        let tab = self.ensure_open()?;
        Ok(tab.get_content()?)
    }

    /// Exceeded waits surface as `PageLoadTimeout` with the URL that was
    /// being loaded, so callers can retry or report it distinctly.
    fn classify(&self, err: anyhow::Error) -> ScrapeError {
        let text = err.to_string().to_lowercase();
        if text.contains("timeout") || text.contains("timed out") || text.contains("never came") {
            ScrapeError::PageLoadTimeout {
                url: self.current_url.clone().unwrap_or_default(),
            }
        } else {
            ScrapeError::Browser(err)
        }
    }

    /// Terminate the browser process and drop the temp profile. Safe to
    /// call when already closed.
    pub fn close(&mut self) {
        if self.browser.take().is_some() {
            info!("Closing browser session");
        }
        self.tab = None;
        self.profile_dir = None;
        self.current_url = None;
    }
}

impl Default for RenderSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_without_launch_is_a_noop() {
        let mut session = RenderSession::new();
        session.close();
        session.close();
    }

    #[test]
    fn wait_errors_classify_as_page_load_timeout() {
        let mut session = RenderSession::new();
        session.current_url = Some("https://turbo.az/autos".to_string());
        let err = session.classify(anyhow::anyhow!("The event waited for never came"));
        match err {
            ScrapeError::PageLoadTimeout { url } => assert_eq!(url, "https://turbo.az/autos"),
            other => panic!("expected PageLoadTimeout, got {other:?}"),
        }
    }

    #[test]
    fn non_timeout_errors_stay_unclassified_browser_failures() {
        let session = RenderSession::new();
        let err = session.classify(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, ScrapeError::Browser(_)));
    }
}

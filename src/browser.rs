//! Remote browsing session abstraction.
//!
//! All page-level operations the pipeline needs (navigate with a timeout,
//! read rendered text, read anchor attributes) go through the narrow
//! [`BrowserSession`] trait. Production uses the Browserless HTTP API, where
//! every `fetch` renders the page in an ephemeral browser page that is
//! released server-side when the response is produced. Tests substitute an
//! in-memory fake.
//!
//! The session is exclusively owned by the orchestrator for the lifetime of
//! a batch; no other component creates or closes it.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;

/// Per-page navigation bound, matching the Browserless `gotoOptions` timeout.
const PAGE_TIMEOUT_MS: u64 = 10_000;

#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate an ephemeral page to `url` and return its rendered content.
    async fn fetch(&self, url: &str) -> Result<PageContent, AppError>;

    /// Release the session. Called on every batch exit path.
    fn close(&self) {}
}

/// Rendered HTML of one page, with the DOM reads the stages need.
///
/// Parsing happens per call; callers hold only owned strings, so nothing
/// non-`Send` crosses an await point.
#[derive(Debug, Clone)]
pub struct PageContent {
    html: String,
}

fn script_style_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"(?is)<(script|style)\b.*?</(script|style)>").unwrap())
}

impl PageContent {
    pub fn new(html: String) -> Self {
        Self { html }
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Visible-ish body text. Script and style blocks are dropped first;
    /// `scraper`'s text iterator would otherwise include them.
    pub fn body_text(&self) -> String {
        let stripped = script_style_re().replace_all(&self.html, " ");
        let doc = Html::parse_document(&stripped);
        let body = Selector::parse("body").unwrap();
        let mut out = String::new();
        for el in doc.select(&body) {
            for chunk in el.text() {
                let chunk = chunk.trim();
                if !chunk.is_empty() {
                    if !out.is_empty() {
                        out.push(' ');
                    }
                    out.push_str(chunk);
                }
            }
        }
        out
    }

    /// First `href` of an anchor accepted by `pred`, in document order.
    pub fn first_anchor_href<F>(&self, pred: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        let doc = Html::parse_document(&self.html);
        let anchors = Selector::parse("a[href]").unwrap();
        doc.select(&anchors)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| pred(href))
            .map(str::to_string)
    }
}

/// Production adapter over the Browserless HTTP API.
#[derive(Debug)]
pub struct BrowserlessSession {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BrowserlessSession {
    /// Opens the shared session for a batch.
    ///
    /// Fails fast (before any lead is touched) when the token is missing or
    /// the service does not answer the pressure probe.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let token = config
            .browserless_token
            .clone()
            .ok_or_else(|| AppError::ConfigError("BROWSERLESS_TOKEN is not configured".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| {
                AppError::SessionUnavailable(format!("failed to build HTTP client: {}", e))
            })?;

        let session = Self {
            client,
            base_url: config.browserless_base_url.clone(),
            token,
        };

        let probe = format!("{}/pressure?token={}", session.base_url, session.token);
        let response = session.client.get(&probe).send().await.map_err(|e| {
            AppError::SessionUnavailable(format!("Browserless unreachable: {}", e))
        })?;
        if !response.status().is_success() {
            return Err(AppError::SessionUnavailable(format!(
                "Browserless pressure probe returned status {}",
                response.status()
            )));
        }

        tracing::info!("✓ Browsing session established: {}", session.base_url);
        Ok(session)
    }
}

#[async_trait]
impl BrowserSession for BrowserlessSession {
    async fn fetch(&self, url: &str) -> Result<PageContent, AppError> {
        let endpoint = format!("{}/content?token={}", self.base_url, self.token);
        let body = serde_json::json!({
            "url": url,
            "gotoOptions": { "waitUntil": "domcontentloaded", "timeout": PAGE_TIMEOUT_MS },
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("navigation failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApiError(format!(
                "Browserless returned status {}: {}",
                status, message
            )));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("failed to read page: {}", e)))?;
        Ok(PageContent::new(html))
    }

    fn close(&self) {
        tracing::debug!("Browsing session released: {}", self.base_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <html><head><style>.x { color: red; }</style></head>
        <body>
          <script>var hidden = "spy@script.com";</script>
          <p>Fale conosco: contato@clinica.com</p>
          <a href="https://instagram.com/clinicabela">Instagram</a>
          <a href="https://example.com/sobre">Sobre</a>
        </body></html>"#;

    #[test]
    fn body_text_skips_script_and_style() {
        let page = PageContent::new(SAMPLE.to_string());
        let text = page.body_text();
        assert!(text.contains("contato@clinica.com"));
        assert!(!text.contains("spy@script.com"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn first_anchor_href_respects_document_order_and_predicate() {
        let page = PageContent::new(SAMPLE.to_string());
        let ig = page.first_anchor_href(|href| href.contains("instagram.com"));
        assert_eq!(ig.as_deref(), Some("https://instagram.com/clinicabela"));
        let none = page.first_anchor_href(|href| href.contains("facebook.com"));
        assert!(none.is_none());
    }
}

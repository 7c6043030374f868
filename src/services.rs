//! External service clients: Google Maps discovery, Google Search
//! sub-lookups, website scraping and the BrasilAPI company registry.
//!
//! Everything that navigates a page goes through the shared
//! [`BrowserSession`]; only the registry talks HTTP directly. Sub-lookups
//! return [`StageOutcome`] so the orchestrator can treat failures as soft.

use moka::future::Cache;
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use url::Url;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::{RegistryInfo, ScrapedSite, SearchContext, StageOutcome};
use crate::sanitizer::only_digits;

/// Maximum stub leads returned per discovery call.
pub const MAX_DISCOVERY_RESULTS: usize = 10;

/// Prefix of scraped page text retained for the AI stage.
pub const RAW_TEXT_LIMIT: usize = 10_000;

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // RFC 5322-lite: local-part@domain.tld
    RE.get_or_init(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap())
}

fn cnpj_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Punctuated registry form: 12.345.678/0001-95
    RE.get_or_init(|| Regex::new(r"\d{2}\.\d{3}\.\d{3}/\d{4}-\d{2}").unwrap())
}

fn br_phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\+?55\s?)?(?:\(?\d{2}\)?\s?)?(?:9\s?\d{4}[-\s]?\d{4}|\d{4}[-\s]?\d{4})")
            .unwrap()
    })
}

// ============ Google Maps discovery ============

/// One result card scraped from a Google Maps search.
#[derive(Debug, Clone, PartialEq)]
pub struct MapsPlace {
    pub nome: String,
    pub telefone: String,
    pub website: String,
}

/// Scrapes candidate leads for a niche/location from Google Maps.
pub struct MapsService {
    session: Arc<dyn BrowserSession>,
    base_url: String,
}

impl MapsService {
    pub fn new(session: Arc<dyn BrowserSession>, config: &Config) -> Self {
        Self {
            session,
            base_url: config.search_base_url.clone(),
        }
    }

    /// Navigates a Maps search for `{nicho} em {location}` and extracts up to
    /// [`MAX_DISCOVERY_RESULTS`] result cards. An empty result set is a hard
    /// error here: the discovery endpoint has nothing to return without it.
    pub async fn search_places(&self, ctx: &SearchContext) -> Result<Vec<MapsPlace>, AppError> {
        let query = format!("{} em {}", ctx.nicho, ctx.location);
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::InternalError(format!("bad search base URL: {}", e)))?;
        url.set_path(&format!("/maps/search/{}", query.trim()));
        url.set_query(Some("hl=pt-BR"));

        tracing::info!("[Maps] Navigating to: {}", url);
        let page = self.session.fetch(url.as_str()).await?;
        let places = parse_maps_results(page.html());
        tracing::info!("[Maps] Extracted {} valid results", places.len());

        if places.is_empty() {
            return Err(AppError::ExternalApiError(
                "Não foi possível encontrar resultados no Google Maps".to_string(),
            ));
        }
        Ok(places)
    }
}

/// Pulls name / phone / website out of the Maps result cards.
///
/// Names come from the `aria-label` of the result anchor, phones from a BR
/// phone pattern over the card text, websites from the authority link when
/// present and otherwise the first external `http` link in the card.
pub fn parse_maps_results(html: &str) -> Vec<MapsPlace> {
    use scraper::{Html, Selector};

    let doc = Html::parse_document(html);
    let article_sel = Selector::parse(r#"div[role="article"]"#).unwrap();
    let result_link_sel = Selector::parse("a.hfpxzc").unwrap();
    let authority_sel = Selector::parse(r#"a[data-item-id="authority"]"#).unwrap();
    let any_link_sel = Selector::parse("a[href]").unwrap();

    let mut seen_names: HashSet<String> = HashSet::new();
    let mut places = Vec::new();

    for article in doc.select(&article_sel) {
        let Some(name) = article
            .select(&result_link_sel)
            .next()
            .and_then(|a| a.value().attr("aria-label"))
            .map(str::trim)
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        if !seen_names.insert(name.to_string()) {
            continue;
        }

        let card_text: String = article.text().collect::<Vec<_>>().join(" ");
        let telefone = br_phone_re()
            .find(&card_text)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let website = article
            .select(&authority_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
            .or_else(|| {
                article
                    .select(&any_link_sel)
                    .filter_map(|a| a.value().attr("href"))
                    .find(|href| {
                        href.starts_with("http")
                            && !href.contains("google.com")
                            && !href.contains("javascript")
                    })
                    .map(str::to_string)
            })
            .unwrap_or_default();

        places.push(MapsPlace {
            nome: name.to_string(),
            telefone,
            website,
        });
        if places.len() >= MAX_DISCOVERY_RESULTS {
            break;
        }
    }

    places
}

// ============ Google Search sub-lookups ============

/// Website / Instagram / CNPJ discovery via plain Google Search pages.
pub struct SearchService {
    session: Arc<dyn BrowserSession>,
    base_url: String,
}

fn is_organic_result(href: &str) -> bool {
    href.starts_with("http")
        && !href.contains("google.")
        && !href.contains("instagram.com")
        && !href.contains("facebook.com")
        && !href.contains("javascript")
}

/// An Instagram link pointing at an actual profile path, not the bare domain.
fn is_instagram_profile(href: &str) -> bool {
    let Some(idx) = href.find("instagram.com/") else {
        return false;
    };
    let rest = &href[idx + "instagram.com/".len()..];
    let handle = rest
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_matches('/');
    !handle.is_empty()
}

impl SearchService {
    pub fn new(session: Arc<dyn BrowserSession>, config: &Config) -> Self {
        Self {
            session,
            base_url: config.search_base_url.clone(),
        }
    }

    fn search_url(&self, query: &str) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::InternalError(format!("bad search base URL: {}", e)))?;
        url.set_path("/search");
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("hl", "pt-BR");
        Ok(url)
    }

    async fn search_page(&self, query: &str) -> Result<crate::browser::PageContent, AppError> {
        let url = self.search_url(query)?;
        self.session.fetch(url.as_str()).await
    }

    /// Resolves a missing website: first organic result that is not the
    /// search engine itself, Instagram, or Facebook.
    pub async fn find_website(&self, nome: &str, location: &str) -> StageOutcome<String> {
        let query = format!("site oficial {} {}", nome, location);
        match self.search_page(&query).await {
            Ok(page) => match page.first_anchor_href(is_organic_result) {
                Some(href) => StageOutcome::Found(href),
                None => StageOutcome::Empty,
            },
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    /// Finds an Instagram profile link for the lead.
    pub async fn find_instagram(&self, nome: &str, location: &str) -> StageOutcome<String> {
        let query = format!("instagram {} {}", nome, location);
        match self.search_page(&query).await {
            Ok(page) => match page.first_anchor_href(is_instagram_profile) {
                Some(href) => StageOutcome::Found(href),
                None => StageOutcome::Empty,
            },
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    /// Finds a CNPJ in the result page text; stored digits-only.
    pub async fn find_cnpj(&self, nome: &str, location: &str) -> StageOutcome<String> {
        let query = format!("CNPJ {} {}", nome, location);
        match self.search_page(&query).await {
            Ok(page) => match cnpj_re().find(&page.body_text()) {
                Some(m) => StageOutcome::Found(only_digits(m.as_str())),
                None => StageOutcome::Empty,
            },
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }
}

// ============ Website scrape ============

/// Loads the lead's website and extracts the first email-shaped substring,
/// the first Instagram anchor, and a bounded prefix of body text for the AI
/// stage.
pub async fn scrape_website(session: &dyn BrowserSession, website: &str) -> StageOutcome<ScrapedSite> {
    let page = match session.fetch(website).await {
        Ok(page) => page,
        Err(e) => return StageOutcome::Failed(e.to_string()),
    };

    let text = page.body_text();
    let email = email_re().find(&text).map(|m| m.as_str().to_string());
    let instagram = page.first_anchor_href(|href| href.contains("instagram.com"));
    let raw_text: String = text.chars().take(RAW_TEXT_LIMIT).collect();

    if email.is_none() && instagram.is_none() && raw_text.is_empty() {
        return StageOutcome::Empty;
    }
    StageOutcome::Found(ScrapedSite {
        email,
        instagram,
        raw_text,
    })
}

// ============ BrasilAPI company registry ============

/// Registry response cache shared across batches, including negative lookups.
pub type RegistryCache = Cache<String, Option<RegistryInfo>>;

/// BrasilAPI CNPJ lookup with a shared response cache.
pub struct RegistryService {
    client: reqwest::Client,
    base_url: String,
    cache: RegistryCache,
}

impl RegistryService {
    pub fn new(config: &Config, cache: RegistryCache) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.brasilapi_base_url.clone(),
            cache,
        }
    }

    /// Looks up a digits-only CNPJ. Not-found is `Empty`; transport and
    /// malformed-response errors are `Failed` (and not cached).
    pub async fn lookup_cnpj(&self, cnpj: &str) -> StageOutcome<RegistryInfo> {
        let digits = only_digits(cnpj);
        if digits.is_empty() {
            return StageOutcome::Empty;
        }

        if let Some(cached) = self.cache.get(&digits).await {
            return match cached {
                Some(info) => StageOutcome::Found(info),
                None => StageOutcome::Empty,
            };
        }

        match self.fetch(&digits).await {
            Ok(Some(info)) => {
                self.cache.insert(digits, Some(info.clone())).await;
                StageOutcome::Found(info)
            }
            Ok(None) => {
                self.cache.insert(digits, None).await;
                StageOutcome::Empty
            }
            Err(e) => StageOutcome::Failed(e.to_string()),
        }
    }

    async fn fetch(&self, digits: &str) -> Result<Option<RegistryInfo>, AppError> {
        let url = format!("{}/cnpj/v1/{}", self.base_url, digits);
        tracing::info!("[Registry] Fetching CNPJ data: {}", digits);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("BrasilAPI request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "BrasilAPI returned status {}",
                response.status()
            )));
        }

        let value: serde_json::Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("failed to parse BrasilAPI response: {}", e))
        })?;
        Ok(Some(registry_info_from_json(&value)))
    }
}

/// The registry encodes "active" as situação cadastral 2; the field arrives
/// as a number or a numeric string depending on the upstream record.
pub fn registry_info_from_json(value: &serde_json::Value) -> RegistryInfo {
    let situacao = &value["situacao_cadastral"];
    let ativa = situacao.as_i64() == Some(2) || situacao.as_str() == Some("2");

    let capital_social = match &value["capital_social"] {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    let data_abertura = value["data_abertura"]
        .as_str()
        .or_else(|| value["data_inicio_atividade"].as_str())
        .map(str::to_string)
        .filter(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok());

    RegistryInfo {
        ativa,
        capital_social,
        data_abertura,
    }
}

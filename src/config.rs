use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Browserless access token. Optional at startup; its absence is reported
    /// as a configuration failure when a batch tries to open a session.
    pub browserless_token: Option<String>,
    pub browserless_base_url: String,
    /// Gemini API key. Optional at startup; its absence resolves the AI stage
    /// to the deterministic local fallback.
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub brasilapi_base_url: String,
    pub search_base_url: String,
    /// Wall-clock budget for one enrichment batch, in seconds. Leads not
    /// reached within the budget are returned unenriched.
    pub batch_deadline_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            browserless_token: std::env::var("BROWSERLESS_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            browserless_base_url: std::env::var("BROWSERLESS_BASE_URL")
                .unwrap_or_else(|_| "https://chrome.browserless.io".to_string())
                .trim_end_matches('/')
                .to_string(),
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("GOOGLE_AI_API_KEY"))
                .ok()
                .filter(|s| !s.trim().is_empty()),
            gemini_api_url: std::env::var("GEMINI_API_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-flash-latest:generateContent"
                    .to_string()
            }),
            brasilapi_base_url: std::env::var("BRASILAPI_BASE_URL")
                .unwrap_or_else(|_| "https://brasilapi.com.br/api".to_string())
                .trim_end_matches('/')
                .to_string(),
            search_base_url: std::env::var("SEARCH_BASE_URL")
                .unwrap_or_else(|_| "https://www.google.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            batch_deadline_secs: std::env::var("BATCH_DEADLINE_SECS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BATCH_DEADLINE_SECS must be a number of seconds"))?,
        };

        for (name, url) in [
            ("BROWSERLESS_BASE_URL", &config.browserless_base_url),
            ("BRASILAPI_BASE_URL", &config.brasilapi_base_url),
            ("SEARCH_BASE_URL", &config.search_base_url),
            ("GEMINI_API_URL", &config.gemini_api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Browserless base URL: {}", config.browserless_base_url);
        tracing::debug!("BrasilAPI base URL: {}", config.brasilapi_base_url);
        tracing::debug!("Search base URL: {}", config.search_base_url);
        tracing::debug!("Server port: {}", config.port);
        if config.browserless_token.is_none() {
            tracing::warn!("BROWSERLESS_TOKEN not set; search/enrich batches will be rejected");
        }
        if config.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set; AI analysis will use the local fallback");
        }

        Ok(config)
    }

    /// A config with no credentials and external base URLs pointed at `base`.
    /// Used by tests to aim every provider at a mock server.
    pub fn for_base_url(base: &str) -> Self {
        Self {
            port: 0,
            browserless_token: Some("test-token".to_string()),
            browserless_base_url: base.trim_end_matches('/').to_string(),
            gemini_api_key: Some("test-key".to_string()),
            gemini_api_url: format!("{}/v1beta/generate", base.trim_end_matches('/')),
            brasilapi_base_url: base.trim_end_matches('/').to_string(),
            search_base_url: base.trim_end_matches('/').to_string(),
            batch_deadline_secs: 50,
        }
    }
}

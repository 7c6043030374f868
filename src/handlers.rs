use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use std::sync::Arc;

use crate::browser::{BrowserSession, BrowserlessSession};
use crate::config::Config;
use crate::dedup;
use crate::errors::AppError;
use crate::models::{DedupRequest, DedupResponse, EnrichRequest, Lead, SearchContext, SearchRequest};
use crate::pipeline::{self, EnrichmentPipeline};
use crate::sanitizer::format_cnpj;
use crate::services::RegistryCache;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Registry response cache shared across batches.
    pub registry_cache: RegistryCache,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vibehunter",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/leads/search
///
/// Discovers up to ten stub leads for a location/niche pair and filters out
/// those the caller's baseline already knows (email OR domain policy).
pub async fn search_leads(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<Lead>>, AppError> {
    if request.location.trim().is_empty() || request.nicho.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Location and Nicho are required fields.".to_string(),
        ));
    }

    tracing::info!(
        ">>> [API] Search started: {} in {} <<<",
        request.nicho,
        request.location
    );

    let session: Arc<dyn BrowserSession> =
        Arc::new(BrowserlessSession::connect(&state.config).await?);
    let ctx = SearchContext {
        location: request.location,
        nicho: request.nicho,
    };

    let leads =
        pipeline::discover_leads(session, &state.config, &ctx, &request.existing_leads).await?;
    tracing::info!("[API] Search finished: {} lead(s)", leads.len());
    Ok(Json(leads))
}

/// POST /api/v1/leads/enrich
///
/// Runs the full enrichment pipeline over the supplied leads. The payload is
/// validated as raw JSON first so a missing/malformed `leads` field yields
/// the documented 400 instead of a deserialization rejection.
pub async fn enrich_leads(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<Vec<Lead>>, AppError> {
    if !payload.get("leads").map_or(false, |v| v.is_array()) {
        return Err(AppError::BadRequest("Leads array is required".to_string()));
    }
    let request: EnrichRequest = serde_json::from_value(payload)
        .map_err(|e| AppError::BadRequest(format!("Invalid enrichment payload: {}", e)))?;

    tracing::info!(
        ">>> [API] Enrichment started: {} lead(s) for {} in {} <<<",
        request.leads.len(),
        request.nicho,
        request.location
    );

    let session: Arc<dyn BrowserSession> =
        Arc::new(BrowserlessSession::connect(&state.config).await?);
    let ctx = SearchContext {
        location: request.location,
        nicho: request.nicho,
    };

    let pipeline = EnrichmentPipeline::new(session, &state.config, state.registry_cache.clone());
    let mut leads = pipeline.enrich_batch(request.leads, &ctx).await;

    // CNPJ is digits-only internally; render the punctuated form at the boundary.
    for lead in &mut leads {
        if let Some(cnpj) = lead.cnpj.take() {
            lead.cnpj = Some(format_cnpj(&cnpj));
        }
    }

    tracing::info!("[API] Enrichment finished: {} lead(s)", leads.len());
    Ok(Json(leads))
}

/// POST /api/v1/leads/dedup
///
/// Final novelty filter: drops enriched leads whose CNPJ or email the
/// caller's baseline already contains.
pub async fn dedup_leads(Json(request): Json<DedupRequest>) -> Json<DedupResponse> {
    let result = dedup::filter_novel(request.leads, &request.existing_leads);
    tracing::info!(
        "[API] Dedup: {} unique, {} removed",
        result.unique.len(),
        result.removed
    );
    Json(DedupResponse {
        leads: result.unique,
        removed_count: result.removed,
    })
}

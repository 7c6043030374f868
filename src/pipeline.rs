//! Batch orchestration.
//!
//! One shared browsing session is acquired per batch and released on every
//! exit path. Discovery builds stub leads from Google Maps; enrichment walks
//! each lead through the fixed stage order
//! (website discovery → scrape → Instagram → CNPJ → registry → AI) strictly
//! one lead at a time, so the shared session never sees concurrent
//! operations. Each stage hands back a typed patch; all merging happens
//! here, under the precedence rules: later stages may fill or override
//! earlier fields, never the reverse, and no stage failure aborts a lead or
//! the batch.

use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::ai_agent::AiAgentService;
use crate::browser::BrowserSession;
use crate::config::Config;
use crate::dedup;
use crate::errors::AppError;
use crate::models::{AiStatus, Lead, SearchContext, StatusVerificacao};
use crate::sanitizer::{
    normalize_domain, normalize_name, only_digits, sanitize_lead, validate_br_phone,
};
use crate::services::{
    scrape_website, MapsPlace, MapsService, RegistryCache, RegistryService, SearchService,
};

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// ============ Discovery batch ============

/// Discovers stub leads for the search context and filters them against the
/// caller's baseline (email OR domain policy).
///
/// The session is released before returning, on success and on failure.
pub async fn discover_leads(
    session: Arc<dyn BrowserSession>,
    config: &Config,
    ctx: &SearchContext,
    existing_leads: &[Lead],
) -> Result<Vec<Lead>, AppError> {
    let maps = MapsService::new(session.clone(), config);
    let result = maps.search_places(ctx).await;
    session.close();

    let places = result?;
    let stubs: Vec<Lead> = places.into_iter().map(|p| stub_lead(p, ctx)).collect();

    let deduped = dedup::filter_against_baseline(stubs, existing_leads);
    if deduped.removed > 0 {
        tracing::info!(
            "[Discovery] {} lead(s) dropped as duplicates of the baseline",
            deduped.removed
        );
    }
    Ok(deduped.unique)
}

fn stub_lead(place: MapsPlace, ctx: &SearchContext) -> Lead {
    let nome = {
        let normalized = normalize_name(&place.nome);
        if normalized.is_empty() {
            place.nome.trim().to_string()
        } else {
            normalized
        }
    };

    let dominio = if place.website.trim().is_empty() {
        None
    } else {
        Some(normalize_domain(&place.website))
    };

    Lead {
        id: Uuid::new_v4().to_string(),
        nome,
        telefone: Some(stub_phone(&place.telefone)),
        website: Some(place.website),
        dominio,
        cidade: ctx.location.clone(),
        servico: ctx.nicho.clone(),
        status_verificacao: StatusVerificacao::Pendente,
        ai_status: AiStatus::Pending,
        ..Default::default()
    }
}

/// E.164-ish phone for a discovery stub, or "-" when nothing usable was
/// scraped. Proper validation first; the digit heuristic keeps numbers the
/// library rejects but a human can still dial.
fn stub_phone(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "-".to_string();
    }
    let (valid, normalized) = validate_br_phone(raw);
    if valid {
        return normalized;
    }
    let digits = only_digits(raw);
    if digits.is_empty() {
        "-".to_string()
    } else if digits.starts_with("55") {
        format!("+{}", digits)
    } else {
        format!("+55{}", digits)
    }
}

// ============ Enrichment batch ============

/// Drives one batch of leads through the enrichment stages.
pub struct EnrichmentPipeline {
    session: Arc<dyn BrowserSession>,
    search: SearchService,
    registry: RegistryService,
    ai: AiAgentService,
    deadline: Duration,
}

impl EnrichmentPipeline {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        config: &Config,
        registry_cache: RegistryCache,
    ) -> Self {
        Self {
            search: SearchService::new(session.clone(), config),
            registry: RegistryService::new(config, registry_cache),
            ai: AiAgentService::new(config),
            deadline: Duration::from_secs(config.batch_deadline_secs),
            session,
        }
    }

    /// Enriches every lead in order. Output length always equals input
    /// length: stage failures degrade a lead, they never drop it, and leads
    /// not reached before the batch deadline pass through untouched.
    ///
    /// Releases the session on return.
    pub async fn enrich_batch(&self, leads: Vec<Lead>, ctx: &SearchContext) -> Vec<Lead> {
        let started = Instant::now();
        let total = leads.len();
        let mut out = Vec::with_capacity(total);

        let mut remaining = leads.into_iter();
        while let Some(lead) = remaining.next() {
            if started.elapsed() >= self.deadline {
                tracing::warn!(
                    "[Enrichment] batch deadline reached after {} of {} lead(s); \
                     returning the rest unenriched",
                    out.len(),
                    total
                );
                out.push(lead);
                out.extend(remaining);
                break;
            }
            out.push(self.enrich_lead(lead, ctx).await);
        }

        self.session.close();
        out
    }

    async fn enrich_lead(&self, mut lead: Lead, ctx: &SearchContext) -> Lead {
        tracing::info!("[Enrichment] Processing lead: {}", lead.nome);
        sanitize_lead(&mut lead);

        // Stage 1: website discovery (skipped when already known)
        if is_blank(&lead.website) {
            if let Some(site) = self
                .search
                .find_website(&lead.nome, &ctx.location)
                .await
                .into_option("discovery")
            {
                tracing::info!("   - Found website: {}", site);
                lead.website = Some(site);
            }
        }
        if is_blank(&lead.dominio) {
            if let Some(website) = lead.website.as_deref().filter(|w| !w.trim().is_empty()) {
                lead.dominio = Some(normalize_domain(website));
            }
        }

        // Stage 2: website scrape
        let mut raw_text = String::new();
        if let Some(website) = lead.website.clone().filter(|w| !w.trim().is_empty()) {
            if let Some(scraped) = scrape_website(self.session.as_ref(), &website)
                .await
                .into_option("scrape")
            {
                if let Some(email) = scraped.email {
                    lead.email = Some(email.trim().to_lowercase());
                }
                if let Some(instagram) = scraped.instagram {
                    lead.instagram = Some(instagram);
                }
                raw_text = scraped.raw_text;
            }
        }

        // Stage 3: Instagram discovery (only when still missing)
        if is_blank(&lead.instagram) {
            if let Some(instagram) = self
                .search
                .find_instagram(&lead.nome, &ctx.location)
                .await
                .into_option("instagram")
            {
                lead.instagram = Some(instagram);
            }
        }

        // Stage 4: CNPJ discovery (only when still missing)
        if is_blank(&lead.cnpj) {
            if let Some(cnpj) = self
                .search
                .find_cnpj(&lead.nome, &ctx.location)
                .await
                .into_option("cnpj")
            {
                lead.cnpj = Some(cnpj);
            }
        }

        // Stage 5: registry enrichment (needs a CNPJ)
        if let Some(cnpj) = lead.cnpj.clone().filter(|c| !c.trim().is_empty()) {
            if let Some(info) = self
                .registry
                .lookup_cnpj(&cnpj)
                .await
                .into_option("registry")
            {
                if info.ativa {
                    lead.mark_verificado();
                }
                if lead.capital_social.is_none() {
                    lead.capital_social = info.capital_social;
                }
                if is_blank(&lead.data_abertura) {
                    lead.data_abertura = info.data_abertura;
                }
            }
        }

        // Stage 6: AI analysis, unconditional and infallible
        let analysis = self.ai.analyze(&lead, ctx, &raw_text).await;
        let profile = analysis.profile;
        if let Some(email) = profile.email {
            lead.email = Some(email.trim().to_lowercase());
        }
        if let Some(cnpj) = profile.cnpj {
            lead.cnpj = Some(cnpj);
        }
        if let Some(instagram) = profile.instagram {
            lead.instagram = Some(instagram);
        }
        lead.lead_score = Some(profile.lead_score);
        lead.especialidades = Some(profile.especialidades);
        lead.perfil_publico = Some(profile.perfil_publico);
        lead.tipo_entidade = Some(profile.tipo_entidade);
        lead.dica_abordagem = Some(profile.dica_abordagem);
        if profile.divergencia_nome {
            lead.flag_revisao_necessaria();
        }
        lead.ai_status = analysis.status;

        lead
    }
}

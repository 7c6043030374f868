//! Gemini structured-extraction client for lead profiling.
//!
//! The stage is invoked for every lead, with or without scraped website
//! text: a lead the scraper came up empty on still gets a best-effort
//! profile from name/location/niche context alone, with an explicit marker
//! in place of the missing site text so the model can weigh its own
//! uncertainty.
//!
//! Any failure (missing credential, transport error, empty response,
//! unparseable JSON) resolves to one deterministic local fallback and
//! `ai_status = failed`. This function is the terminal error boundary of
//! the stage; it never errors out.

use serde::Deserialize;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AiProfile, AiStatus, Lead, SearchContext, TipoEntidade};
use crate::sanitizer::only_digits;

/// Scraped text budget embedded in the prompt.
pub const PROMPT_TEXT_LIMIT: usize = 5_000;

/// Marker substituted when no website text could be scraped.
pub const MISSING_SITE_MARKER: &str = "SITE NÃO ENCONTRADO";

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

/// Result of one analysis: the profile to merge plus the status to record.
#[derive(Debug)]
pub struct AiAnalysis {
    pub profile: AiProfile,
    pub status: AiStatus,
}

pub struct AiAgentService {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

impl AiAgentService {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_url: config.gemini_api_url.clone(),
            api_key: config.gemini_api_key.clone(),
        }
    }

    /// Analyzes one lead. Never fails: every error path yields the
    /// deterministic fallback profile with `AiStatus::Failed`.
    pub async fn analyze(&self, lead: &Lead, ctx: &SearchContext, raw_text: &str) -> AiAnalysis {
        tracing::info!(
            "🤖 [AI Agent] Analyzing: {} | location: {} | niche: {} | input: {} chars ({})",
            lead.nome,
            ctx.location,
            ctx.nicho,
            raw_text.len(),
            if raw_text.trim().is_empty() {
                "fallback context only"
            } else {
                "website text"
            }
        );

        match self.try_analyze(lead, ctx, raw_text).await {
            Ok(profile) => {
                tracing::info!(
                    "✨ [AI Agent] Score {}/5 for {} | perfil: {}",
                    profile.lead_score,
                    lead.nome,
                    profile.perfil_publico
                );
                AiAnalysis {
                    profile,
                    status: AiStatus::Processed,
                }
            }
            Err(e) => {
                tracing::warn!("[AI Agent] ❌ {}: using local fallback for {}", e, lead.nome);
                AiAnalysis {
                    profile: fallback_profile(&lead.nome, &ctx.nicho),
                    status: AiStatus::Failed,
                }
            }
        }
    }

    async fn try_analyze(
        &self,
        lead: &Lead,
        ctx: &SearchContext,
        raw_text: &str,
    ) -> Result<AiProfile, AppError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::ConfigError("GEMINI_API_KEY is not configured".to_string()))?;

        let prompt = build_prompt(lead, ctx, raw_text);
        let url = format!("{}?key={}", self.api_url, api_key);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("model request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "model returned status {}",
                response.status()
            )));
        }

        let parsed: GeminiResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("failed to read model response: {}", e))
        })?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::ExternalApiError("empty model response".to_string()))?;

        parse_profile(&text, &ctx.nicho)
    }
}

/// Extraction instruction sent to the model, in the dashboard's language.
fn build_prompt(lead: &Lead, ctx: &SearchContext, raw_text: &str) -> String {
    let site_context = if raw_text.trim().is_empty() {
        MISSING_SITE_MARKER.to_string()
    } else {
        raw_text.chars().take(PROMPT_TEXT_LIMIT).collect()
    };
    let telefone = lead
        .telefone
        .as_deref()
        .filter(|t| !t.is_empty() && *t != "-")
        .map(|t| format!(" Telefone conhecido: '{}'.", t))
        .unwrap_or_default();

    format!(
        "Você é um extrator de dados. Receba o nome '{nome}' e local '{location}'.{telefone} \
         Retorne APENAS um JSON com os campos: instagram (handle), email, cnpj, lead_score (1-5), \
         perfil_publico, tipo_entidade ('profissional_liberal' ou 'empresa'), dica_abordagem, \
         especialidades (lista) e divergencia_nome (booleano, true se o nome encontrado divergir). \
         Se não souber, estime com base no mercado de {nicho} de {location}. \
         Use este contexto do site se disponível: {site_context}",
        nome = lead.nome,
        location = ctx.location,
        telefone = telefone,
        nicho = ctx.nicho,
        site_context = site_context,
    )
}

/// Strips Markdown code-fence delimiters the model often wraps JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parses the model text into a profile, applying the contract defaults:
/// `especialidades` falls back to `[nicho]`, identity fields are trimmed to
/// `None` when empty, and the CNPJ is reduced to digits.
pub fn parse_profile(text: &str, nicho: &str) -> Result<AiProfile, AppError> {
    let cleaned = strip_code_fences(text);
    let mut profile: AiProfile = serde_json::from_str(&cleaned)
        .map_err(|e| AppError::ExternalApiError(format!("invalid model JSON: {}", e)))?;

    if profile.especialidades.is_empty() {
        profile.especialidades = vec![nicho.to_string()];
    }
    profile.email = profile.email.filter(|s| !s.trim().is_empty());
    profile.instagram = profile.instagram.filter(|s| !s.trim().is_empty());
    profile.whatsapp = profile.whatsapp.filter(|s| !s.trim().is_empty());
    profile.cnpj = profile
        .cnpj
        .map(|c| only_digits(&c))
        .filter(|c| !c.is_empty());

    Ok(profile)
}

/// True when the name carries a doctor-style honorific token ("Dr." / "Dra").
fn has_honorific(nome: &str) -> bool {
    nome.split_whitespace().any(|token| {
        let token = token.trim_matches('.').to_lowercase();
        token == "dr" || token == "dra"
    })
}

/// Deterministic local fallback used whenever the model cannot be consulted
/// or answers with something unusable.
pub fn fallback_profile(nome: &str, nicho: &str) -> AiProfile {
    let tipo_entidade = if has_honorific(nome) {
        TipoEntidade::ProfissionalLiberal
    } else {
        TipoEntidade::Empresa
    };

    AiProfile {
        email: None,
        cnpj: None,
        instagram: None,
        whatsapp: None,
        divergencia_nome: false,
        especialidades: vec![nicho.to_string()],
        lead_score: 1,
        perfil_publico: "Não identificado".to_string(),
        tipo_entidade,
        dica_abordagem: format!("Abordagem focada em serviços de {} para {}.", nicho, nome),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        let fenced = "```json\n{\"lead_score\": 4}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"lead_score\": 4}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn parse_profile_applies_defaults() {
        let profile = parse_profile(
            "```json\n{\"email\": \"a@b.com\", \"cnpj\": \"12.345.678/0001-95\", \"lead_score\": \"4\"}\n```",
            "estética",
        )
        .unwrap();
        assert_eq!(profile.email.as_deref(), Some("a@b.com"));
        assert_eq!(profile.cnpj.as_deref(), Some("12345678000195"));
        assert_eq!(profile.lead_score, 4);
        assert_eq!(profile.especialidades, vec!["estética".to_string()]);
        assert!(!profile.divergencia_nome);
        assert_eq!(profile.tipo_entidade, TipoEntidade::Empresa);
    }

    #[test]
    fn parse_profile_clamps_score_and_drops_empty_fields() {
        let profile =
            parse_profile("{\"lead_score\": 99, \"email\": \"  \", \"instagram\": \"\"}", "x")
                .unwrap();
        assert_eq!(profile.lead_score, 5);
        assert!(profile.email.is_none());
        assert!(profile.instagram.is_none());
    }

    #[test]
    fn parse_profile_rejects_non_json() {
        assert!(parse_profile("desculpe, não sei", "x").is_err());
    }

    #[test]
    fn fallback_is_deterministic_and_references_niche_and_name() {
        let a = fallback_profile("Clínica Bela", "estética");
        let b = fallback_profile("Clínica Bela", "estética");
        assert_eq!(a.lead_score, 1);
        assert_eq!(a.perfil_publico, "Não identificado");
        assert_eq!(a.especialidades, vec!["estética".to_string()]);
        assert!(a.dica_abordagem.contains("estética"));
        assert!(a.dica_abordagem.contains("Clínica Bela"));
        assert_eq!(a.dica_abordagem, b.dica_abordagem);
    }

    #[test]
    fn fallback_entity_type_follows_honorific_tokens() {
        assert_eq!(
            fallback_profile("Dra. Ana Lima", "estética").tipo_entidade,
            TipoEntidade::ProfissionalLiberal
        );
        assert_eq!(
            fallback_profile("Dr Paulo", "estética").tipo_entidade,
            TipoEntidade::ProfissionalLiberal
        );
        assert_eq!(
            fallback_profile("Clínica Bela", "estética").tipo_entidade,
            TipoEntidade::Empresa
        );
        // "Sandra" contains "dra" but is not an honorific token.
        assert_eq!(
            fallback_profile("Sandra Souza", "estética").tipo_entidade,
            TipoEntidade::Empresa
        );
    }
}

use serde::{Deserialize, Serialize};

// ============ Lead Model ============

/// Verification state of a lead. Transitions only move forward from
/// `Pendente`; the AI name-mismatch flag is the one override allowed to
/// replace an earlier `Verificado`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusVerificacao {
    #[default]
    #[serde(rename = "pendente")]
    Pendente,
    /// Registry-confirmed active company.
    #[serde(rename = "verificado")]
    Verificado,
    /// AI flagged a name mismatch between sources.
    #[serde(rename = "revisão_necessária")]
    RevisaoNecessaria,
    #[serde(rename = "nao_verificado")]
    NaoVerificado,
}

/// Outcome of the AI analysis stage for a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiStatus {
    #[default]
    Pending,
    Processed,
    Failed,
}

/// Kind of entity behind a lead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipoEntidade {
    #[serde(rename = "profissional_liberal")]
    ProfissionalLiberal,
    #[default]
    #[serde(rename = "empresa")]
    Empresa,
}

/// A candidate business lead, the unit of work of the pipeline.
///
/// Field names match the wire format consumed by the dashboard. The CNPJ is
/// held digits-only internally; handlers render the punctuated form at the
/// response boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub nome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default)]
    pub cidade: String,
    #[serde(default)]
    pub servico: String,
    #[serde(default)]
    pub status_verificacao: StatusVerificacao,
    #[serde(default)]
    pub ai_status: AiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub especialidades: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perfil_publico: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tipo_entidade: Option<TipoEntidade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dica_abordagem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_social: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_abertura: Option<String>,
}

impl Lead {
    /// Registry-confirmed upgrade. Only a `pendente` lead moves to
    /// `verificado`; later stages never downgrade an earlier decision.
    pub fn mark_verificado(&mut self) {
        if self.status_verificacao == StatusVerificacao::Pendente {
            self.status_verificacao = StatusVerificacao::Verificado;
        }
    }

    /// An AI-detected name mismatch forces manual review regardless of the
    /// current status.
    pub fn flag_revisao_necessaria(&mut self) {
        self.status_verificacao = StatusVerificacao::RevisaoNecessaria;
    }
}

// ============ Search Context ============

/// Location + niche pair driving provider queries. Immutable for the
/// lifetime of a batch.
#[derive(Debug, Clone)]
pub struct SearchContext {
    pub location: String,
    pub nicho: String,
}

// ============ Stage Results ============

/// Explicit result of a best-effort pipeline stage.
///
/// `Failed` carries the reason so that soft failures are a logged, tested
/// branch rather than silent fallthrough. A failed stage never aborts the
/// lead or the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Found(T),
    Empty,
    Failed(String),
}

impl<T> StageOutcome<T> {
    /// Collapse into the data for merging, logging the failure reason.
    pub fn into_option(self, stage: &str) -> Option<T> {
        match self {
            StageOutcome::Found(v) => Some(v),
            StageOutcome::Empty => None,
            StageOutcome::Failed(reason) => {
                tracing::warn!("[{}] soft failure: {}", stage, reason);
                None
            }
        }
    }
}

/// Partial patch produced by the website scrape stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapedSite {
    pub email: Option<String>,
    pub instagram: Option<String>,
    pub raw_text: String,
}

/// Partial patch produced by the registry enrichment stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryInfo {
    /// Registry reports the company as active (situação cadastral 2).
    pub ativa: bool,
    pub capital_social: Option<f64>,
    pub data_abertura: Option<String>,
}

// ============ AI Analysis Result ============

fn default_lead_score() -> u8 {
    1
}

/// Accept the lead score as a JSON number or numeric string; the model does
/// not reliably emit an integer.
fn de_lead_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let score = match &value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(1.0) as i64,
        serde_json::Value::String(s) => s.trim().parse::<i64>().unwrap_or(1),
        _ => 1,
    };
    Ok(score.clamp(1, 5) as u8)
}

/// Structured extraction result for one lead, parsed from the model response
/// or produced by the deterministic local fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub divergencia_nome: bool,
    #[serde(default)]
    pub especialidades: Vec<String>,
    #[serde(
        default = "default_lead_score",
        deserialize_with = "de_lead_score"
    )]
    pub lead_score: u8,
    #[serde(default)]
    pub perfil_publico: String,
    #[serde(default)]
    pub tipo_entidade: TipoEntidade,
    #[serde(default)]
    pub dica_abordagem: String,
}

// ============ API Request/Response Models ============

/// Request payload for the lead discovery endpoint.
#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub nicho: String,
    #[serde(default, rename = "existingLeads", alias = "existing_leads")]
    pub existing_leads: Vec<Lead>,
}

/// Request payload for the enrichment endpoint.
#[derive(Debug, Deserialize)]
pub struct EnrichRequest {
    pub leads: Vec<Lead>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub nicho: String,
}

/// Request payload for the post-batch novelty filter.
#[derive(Debug, Deserialize)]
pub struct DedupRequest {
    #[serde(default)]
    pub leads: Vec<Lead>,
    #[serde(default, rename = "existingLeads", alias = "existing_leads")]
    pub existing_leads: Vec<Lead>,
}

/// Response payload for the post-batch novelty filter.
#[derive(Debug, Serialize)]
pub struct DedupResponse {
    pub leads: Vec<Lead>,
    pub removed_count: usize,
}

//! String canonicalization for lead data.
//!
//! Pure helpers shared by every stage: names, phones, domains and CNPJ all
//! have one canonical internal form, and comparison keys are derived here so
//! that matching stays normalization-insensitive.

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;

use crate::models::Lead;

/// Keep only ASCII digits.
pub fn only_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Capitalizes the first letter of each whitespace-separated word.
pub fn capitalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats a phone number to international standard (E.164-ish).
///
/// 11 digits are treated as a BR mobile (`+55 AA NNNNN-NNNN`), 10 digits as
/// a BR landline (`+55 AA NNNN-NNNN`). Anything else passes through, gaining
/// a `+` prefix only when the input lacks one. Never fails; empty in, empty
/// out.
pub fn format_phone_number(phone: &str) -> String {
    if phone.is_empty() {
        return String::new();
    }
    let digits = only_digits(phone);
    if digits.len() == 11 {
        return format!("+55 {} {}-{}", &digits[0..2], &digits[2..7], &digits[7..]);
    }
    if digits.len() == 10 {
        return format!("+55 {} {}-{}", &digits[0..2], &digits[2..6], &digits[6..]);
    }
    if phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("+{}", digits)
    }
}

/// Normalizes a domain to its bare host: no protocol, no leading `www.`,
/// no path, lowercase, trimmed. Idempotent.
pub fn normalize_domain(domain: &str) -> String {
    if domain.is_empty() {
        return String::new();
    }
    let d = domain.trim().to_lowercase();
    let d = d
        .strip_prefix("https://")
        .or_else(|| d.strip_prefix("http://"))
        .unwrap_or(&d);
    let d = d.strip_prefix("www.").unwrap_or(d);
    d.split('/').next().unwrap_or("").to_string()
}

/// Strips marketing suffixes from search-engine-derived names by cutting at
/// the first `|`, `-`, `:` or `•`.
pub fn normalize_name(name: &str) -> String {
    name.split(['|', '-', ':', '•'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Canonical key for equality matching only: lowercase, trimmed, all
/// whitespace removed. Never used for display.
pub fn normalize_for_comparison(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Renders a digits-only CNPJ in the punctuated registry form
/// (`12.345.678/0001-95`). Anything that is not exactly 14 digits is
/// returned unchanged.
pub fn format_cnpj(cnpj: &str) -> String {
    let digits = only_digits(cnpj);
    if digits.len() != 14 {
        return cnpj.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}

/// Validate and normalize a Brazilian phone number.
///
/// Uses the phonenumber library (port of Google's libphonenumber) to parse
/// with the BR region and format to E.164 (`+5511987654321`).
///
/// Returns `(is_valid, normalized_phone_or_error_msg)`.
pub fn validate_br_phone(raw: &str) -> (bool, String) {
    // Skip empty or very short strings
    if raw.trim().is_empty() || raw.len() < 8 {
        return (false, "Phone too short".to_string());
    }

    match phonenumber::parse(Some(CountryId::BR), raw) {
        Ok(number) => {
            if phonenumber::is_valid(&number) {
                let formatted = number.format().mode(Mode::E164).to_string();
                tracing::debug!("✓ Valid BR phone: {} → {}", raw, formatted);
                (true, formatted)
            } else {
                tracing::warn!("❌ Invalid BR phone number: {}", raw);
                (false, "Invalid Brazilian phone number".to_string())
            }
        }
        Err(e) => {
            tracing::warn!("❌ Failed to parse BR phone '{}': {:?}", raw, e);
            (false, format!("Parse error: {:?}", e))
        }
    }
}

/// Sanitizes a lead in place for internal consistency: capitalized name,
/// formatted phone, normalized domain, lowercase trimmed email, digits-only
/// CNPJ.
pub fn sanitize_lead(lead: &mut Lead) {
    if !lead.nome.is_empty() {
        lead.nome = capitalize(&lead.nome);
    }
    if let Some(telefone) = lead.telefone.take() {
        lead.telefone = Some(format_phone_number(&telefone));
    }
    if let Some(dominio) = lead.dominio.take() {
        lead.dominio = Some(normalize_domain(&dominio));
    }
    if let Some(email) = lead.email.take() {
        lead.email = Some(email.trim().to_lowercase());
    }
    if let Some(cnpj) = lead.cnpj.take() {
        lead.cnpj = Some(only_digits(&cnpj));
    }
}

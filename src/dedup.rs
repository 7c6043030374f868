//! Lead deduplication against a caller-supplied baseline dataset.
//!
//! Two independent matching policies exist on purpose and must stay at their
//! respective call sites:
//!
//! - [`filter_against_baseline`]: email OR domain keys, applied when freshly
//!   discovered leads are compared with the user's uploaded base.
//! - [`filter_novel`]: CNPJ OR email keys, applied after enrichment to keep
//!   only leads the base has never seen ("inéditos").
//!
//! Both policies collect the baseline keys into hash sets, so the result is
//! insensitive to the order of either collection, and an absent key on
//! either side never produces a match.

use std::collections::HashSet;

use crate::models::Lead;
use crate::sanitizer::{normalize_for_comparison, only_digits};

/// Unique subset plus how many incoming records were dropped as duplicates.
#[derive(Debug)]
pub struct DedupResult {
    pub unique: Vec<Lead>,
    pub removed: usize,
}

fn comparison_key(value: Option<&str>) -> Option<String> {
    let key = normalize_for_comparison(value?);
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

fn cnpj_key(value: Option<&str>) -> Option<String> {
    let digits = only_digits(value?);
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Drops incoming leads that share a normalized email or domain with any
/// baseline lead.
pub fn filter_against_baseline(incoming: Vec<Lead>, baseline: &[Lead]) -> DedupResult {
    let emails: HashSet<String> = baseline
        .iter()
        .filter_map(|l| comparison_key(l.email.as_deref()))
        .collect();
    let domains: HashSet<String> = baseline
        .iter()
        .filter_map(|l| comparison_key(l.dominio.as_deref()))
        .collect();

    let total = incoming.len();
    let unique: Vec<Lead> = incoming
        .into_iter()
        .filter(|lead| {
            let dup_email = comparison_key(lead.email.as_deref())
                .is_some_and(|k| emails.contains(&k));
            let dup_domain = comparison_key(lead.dominio.as_deref())
                .is_some_and(|k| domains.contains(&k));
            !(dup_email || dup_domain)
        })
        .collect();

    DedupResult {
        removed: total - unique.len(),
        unique,
    }
}

/// Drops incoming leads that share a digits-only CNPJ or a normalized email
/// with any baseline lead. This is the final novelty filter run after a
/// batch completes.
pub fn filter_novel(incoming: Vec<Lead>, baseline: &[Lead]) -> DedupResult {
    let cnpjs: HashSet<String> = baseline
        .iter()
        .filter_map(|l| cnpj_key(l.cnpj.as_deref()))
        .collect();
    let emails: HashSet<String> = baseline
        .iter()
        .filter_map(|l| comparison_key(l.email.as_deref()))
        .collect();

    let total = incoming.len();
    let unique: Vec<Lead> = incoming
        .into_iter()
        .filter(|lead| {
            let dup_cnpj =
                cnpj_key(lead.cnpj.as_deref()).is_some_and(|k| cnpjs.contains(&k));
            let dup_email = comparison_key(lead.email.as_deref())
                .is_some_and(|k| emails.contains(&k));
            !(dup_cnpj || dup_email)
        })
        .collect();

    DedupResult {
        removed: total - unique.len(),
        unique,
    }
}

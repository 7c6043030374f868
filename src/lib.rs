//! VibeHunter Lead Prospecting Library
//!
//! This library provides the core functionality for the VibeHunter lead
//! discovery and enrichment API: Google Maps lead discovery, per-lead
//! enrichment (website scraping, Instagram/CNPJ lookup, BrasilAPI registry
//! data, Gemini structured extraction) and deduplication against a
//! caller-supplied baseline dataset.
//!
//! # Modules
//!
//! - `ai_agent`: Gemini structured-extraction client with local fallback.
//! - `browser`: Remote browsing session abstraction (Browserless adapter).
//! - `config`: Configuration management.
//! - `dedup`: Lead deduplication policies.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `pipeline`: Batch orchestration of the enrichment stages.
//! - `sanitizer`: String canonicalization (names, phones, domains, CNPJ).
//! - `services`: External service clients (Google Maps/Search, BrasilAPI).

pub mod ai_agent;
pub mod browser;
pub mod config;
pub mod dedup;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod sanitizer;
pub mod services;

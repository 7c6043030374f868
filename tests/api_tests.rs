/// Handler-level tests for request validation and response shapes.
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use vibehunter::config::Config;
use vibehunter::errors::AppError;
use vibehunter::handlers::{self, AppState};
use vibehunter::models::{DedupRequest, Lead, SearchRequest};

fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        config: Config::for_base_url("http://localhost:0"),
        registry_cache: moka::future::Cache::builder().max_capacity(10).build(),
    })
}

#[tokio::test]
async fn test_health_reports_service_identity() {
    let (status, Json(body)) = handlers::health().await;
    assert_eq!(status, axum::http::StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "vibehunter");
}

#[tokio::test]
async fn test_search_rejects_missing_location() {
    let request = SearchRequest {
        location: "   ".to_string(),
        nicho: "estética".to_string(),
        existing_leads: vec![],
    };
    let err = handlers::search_leads(State(test_state()), Json(request))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_search_rejects_missing_niche() {
    let request = SearchRequest {
        location: "Recife".to_string(),
        nicho: "".to_string(),
        existing_leads: vec![],
    };
    let err = handlers::search_leads(State(test_state()), Json(request))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_enrich_requires_leads_array() {
    let payload = serde_json::json!({ "location": "Recife", "nicho": "estética" });
    let err = handlers::enrich_leads(State(test_state()), Json(payload))
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert_eq!(msg, "Leads array is required"),
        other => panic!("expected BadRequest, got {:?}", other),
    }

    // A non-array value is rejected the same way
    let payload = serde_json::json!({ "leads": "not-a-list" });
    let err = handlers::enrich_leads(State(test_state()), Json(payload))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_enrich_rejects_malformed_lead_entries() {
    let payload = serde_json::json!({
        "leads": [{ "id": 42 }],
        "location": "Recife",
        "nicho": "estética"
    });
    let err = handlers::enrich_leads(State(test_state()), Json(payload))
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert!(msg.contains("Invalid enrichment payload")),
        other => panic!("expected BadRequest, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dedup_endpoint_reports_removed_count() {
    let request = DedupRequest {
        leads: vec![
            Lead {
                id: "1".to_string(),
                nome: "A".to_string(),
                email: Some("a@x.com".to_string()),
                ..Default::default()
            },
            Lead {
                id: "2".to_string(),
                nome: "B".to_string(),
                email: Some("b@y.com".to_string()),
                ..Default::default()
            },
        ],
        existing_leads: vec![Lead {
            id: "3".to_string(),
            nome: "Existing".to_string(),
            email: Some("A@X.COM".to_string()),
            ..Default::default()
        }],
    };

    let Json(response) = handlers::dedup_leads(Json(request)).await;
    assert_eq!(response.removed_count, 1);
    assert_eq!(response.leads.len(), 1);
    assert_eq!(response.leads[0].email.as_deref(), Some("b@y.com"));
}

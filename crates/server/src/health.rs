use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use smeta_core::catalog::Catalog;
use smeta_docs::DocumentGenerator;

#[derive(Clone)]
pub struct HealthState {
    catalog: Arc<Catalog>,
    documents: Arc<DocumentGenerator>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: HealthCheck,
    pub converter: HealthCheck,
    pub checked_at: String,
}

pub fn router(catalog: Arc<Catalog>, documents: Arc<DocumentGenerator>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { catalog, documents })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = catalog_check(&state.catalog);
    // HTML degradation is a supported mode; a missing converter does not
    // fail the readiness check.
    let converter = if state.documents.pdf_capable() {
        HealthCheck { status: "ready", detail: "wkhtmltopdf available".to_string() }
    } else {
        HealthCheck {
            status: "missing",
            detail: "wkhtmltopdf not found; documents render as HTML".to_string(),
        }
    };

    let ready = catalog.status == "ready";
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "smeta-server runtime initialized".to_string(),
        },
        catalog,
        converter,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn catalog_check(catalog: &Catalog) -> HealthCheck {
    if catalog.products().is_empty() {
        HealthCheck { status: "degraded", detail: "catalog has no products".to_string() }
    } else {
        HealthCheck {
            status: "ready",
            detail: format!(
                "{} products, {} services",
                catalog.products().len(),
                catalog.services().len()
            ),
        }
    }
}

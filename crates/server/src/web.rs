//! Web intake form and pricing API.
//!
//! - `GET  /`                       — order form (HTML)
//! - `POST /api/orders`             — price an order, return the estimate JSON
//! - `POST /api/orders/documents`   — render a document for an order

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use smeta_core::catalog::Catalog;
use smeta_core::errors::{ApplicationError, DomainError, InterfaceError};
use smeta_core::estimate::{build_estimate, EstimateResult};
use smeta_core::order::Order;
use smeta_docs::{DocumentGenerator, DocumentKind};

#[derive(Clone)]
pub struct WebState {
    pub catalog: Arc<Catalog>,
    pub documents: Arc<DocumentGenerator>,
    pub form_templates: Arc<tera::Tera>,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/orders", post(price_order))
        .route("/api/orders/documents", post(render_document))
        .with_state(state)
}

/// Compiled-in order form; one page, no static pipeline.
pub fn form_templates() -> Result<tera::Tera, tera::Error> {
    let mut tera = tera::Tera::default();
    tera.add_raw_template("index.html.tera", include_str!("../../../templates/index.html.tera"))?;
    Ok(tera)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub order: Order,
    pub estimate: EstimateResult,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub kind: DocumentKindParam,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKindParam {
    Proposal,
    Estimate,
}

impl From<DocumentKindParam> for DocumentKind {
    fn from(param: DocumentKindParam) -> Self {
        match param {
            DocumentKindParam::Proposal => Self::Proposal,
            DocumentKindParam::Estimate => Self::Estimate,
        }
    }
}

async fn index(State(state): State<WebState>) -> Response {
    let mut context = tera::Context::new();
    context.insert("products", state.catalog.products());

    match state.form_templates.render("index.html.tera", &context) {
        Ok(html) => Html(html).into_response(),
        Err(error) => {
            warn!(error = %error, "order form render failed");
            let interface = ApplicationError::Rendering(error.to_string())
                .into_interface(&new_correlation_id());
            error_response(interface)
        }
    }
}

async fn price_order(
    State(state): State<WebState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<PriceResponse>, Response> {
    let correlation_id = new_correlation_id();
    let order = parse_order(payload, &correlation_id)?;
    let estimate = build_estimate(&order, &state.catalog).map_err(|error| {
        error_response(
            ApplicationError::from(DomainError::from(error)).into_interface(&correlation_id),
        )
    })?;

    info!(
        correlation_id = %correlation_id,
        grand_total = estimate.grand_total,
        lines = estimate.lines.len(),
        "order priced via web api"
    );
    Ok(Json(PriceResponse { order, estimate }))
}

async fn render_document(
    State(state): State<WebState>,
    Query(query): Query<DocumentQuery>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, Response> {
    let correlation_id = new_correlation_id();
    let order = parse_order(payload, &correlation_id)?;
    let kind = DocumentKind::from(query.kind);

    let output = state.documents.render_order(&order, &state.catalog, kind).await.map_err(
        |error| {
            error_response(
                ApplicationError::Rendering(error.to_string()).into_interface(&correlation_id),
            )
        },
    )?;

    let file_name = format!("{}_{}.{}", kind.file_stem(), order.client_name, output.extension());
    let content_type = output.content_type();

    info!(correlation_id = %correlation_id, file_name = %file_name, "document rendered via web api");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(Body::from(output.into_bytes()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

fn parse_order(payload: serde_json::Value, correlation_id: &str) -> Result<Order, Response> {
    let order: Order = serde_json::from_value(payload).map_err(|error| {
        error_response(
            InterfaceError::BadRequest {
                message: format!("malformed order payload: {error}"),
                correlation_id: correlation_id.to_string(),
            },
        )
    })?;

    order.validate().map_err(|error| {
        error_response(
            ApplicationError::from(DomainError::from(error)).into_interface(correlation_id),
        )
    })?;

    Ok(order)
}

fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn error_response(interface: InterfaceError) -> Response {
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ErrorBody {
        error: interface.user_message().to_string(),
        correlation_id: interface.correlation_id().to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::Json;
    use serde_json::json;

    use smeta_core::catalog::Catalog;
    use smeta_core::config::{CompanyConfig, DocumentsConfig};
    use smeta_docs::DocumentGenerator;

    use super::{price_order, render_document, DocumentKindParam, DocumentQuery, WebState};

    fn state() -> WebState {
        let config = DocumentsConfig {
            template_dir: PathBuf::from("templates"),
            asset_dir: PathBuf::from("assets"),
            company: CompanyConfig {
                name: "VLG Septik".to_string(),
                phone: "+7 (960) 879-13-62".to_string(),
                email: "vlg-septik@yandex.ru".to_string(),
                website: "www.vlg-septik.ru".to_string(),
            },
        };
        WebState {
            catalog: Arc::new(Catalog::builtin()),
            documents: Arc::new(DocumentGenerator::with_embedded_templates(&config)),
            form_templates: Arc::new(super::form_templates().expect("form template")),
        }
    }

    #[tokio::test]
    async fn prices_a_minimal_order_with_defaults() {
        let payload = json!({ "client_name": "Ivan" });
        let Json(response) =
            price_order(State(state()), Json(payload)).await.expect("priced");

        // Station + base install + trenching + delivery.
        assert_eq!(response.estimate.lines.len(), 4);
        assert_eq!(response.estimate.grand_total, 152_500);
        assert_eq!(response.order.pipe_length_m, 5);
    }

    #[tokio::test]
    async fn rejects_a_non_numeric_pipe_length() {
        let payload = json!({ "client_name": "Ivan", "pipe_length": "ten" });
        let response = price_order(State(state()), Json(payload)).await.err().expect("rejected");
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rejects_a_negative_free_form_price() {
        let payload = json!({
            "client_name": "Ivan",
            "custom_items": [{ "name": "Haul away spoil", "price": -100 }]
        });
        let response = price_order(State(state()), Json(payload)).await.err().expect("rejected");
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn renders_a_document_with_a_download_disposition() {
        let payload = json!({ "client_name": "Ivan" });
        let response = render_document(
            State(state()),
            Query(DocumentQuery { kind: DocumentKindParam::Estimate }),
            Json(payload),
        )
        .await
        .expect("rendered");

        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let disposition = response
            .headers()
            .get(axum::http::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(disposition.contains("estimate_Ivan"));
    }
}

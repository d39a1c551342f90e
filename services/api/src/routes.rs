use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde::Serialize;
use serde_json::json;

use loanscout::error::AppError;
use loanscout::qualification::{
    session_router, ProductSummary, QualificationService, QuestionStore, RuleStore, SessionApi,
    SessionStore,
};

use crate::infra::AppState;

#[derive(Debug, Serialize)]
pub(crate) struct CatalogResponse {
    pub(crate) products: Vec<ProductSummary>,
}

pub(crate) fn with_session_routes<R, Q, S>(api: SessionApi<R, Q, S>) -> axum::Router
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
    S: SessionStore + 'static,
{
    let service = Arc::clone(&api.service);
    session_router(api)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .merge(
            axum::Router::new()
                .route("/api/v1/catalog", axum::routing::get(catalog_endpoint::<R, Q>))
                .with_state(service),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn catalog_endpoint<R, Q>(
    State(service): State<Arc<QualificationService<R, Q>>>,
) -> Result<Json<CatalogResponse>, AppError>
where
    R: RuleStore + 'static,
    Q: QuestionStore + 'static,
{
    let products = service.baseline_product_ids().await?;
    let products = service.product_summaries(&products).await?;
    Ok(Json(CatalogResponse { products }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{seed_catalog, InMemorySessionStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use loanscout::qualification::ScoringConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let catalog = Arc::new(seed_catalog());
        let service = Arc::new(QualificationService::new(
            catalog.clone(),
            catalog,
            ScoringConfig::default(),
        ));
        with_session_routes(SessionApi {
            service,
            sessions: Arc::new(InMemorySessionStore::default()),
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        assert_eq!(payload.get("status"), Some(&json!("ok")));
    }

    #[tokio::test]
    async fn catalog_lists_the_seeded_panel() {
        let response = app()
            .oneshot(Request::get("/api/v1/catalog").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        let products = payload
            .get("products")
            .and_then(Value::as_array)
            .expect("products array");
        assert_eq!(products.len(), 5);
        assert!(products
            .iter()
            .any(|product| product.get("lender_name") == Some(&json!("Meridian Bank"))));
    }

    #[tokio::test]
    async fn sessions_open_with_the_bankruptcy_question() {
        let app = app();
        let response = app
            .clone()
            .oneshot(Request::post("/api/v1/sessions").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = json_body(response).await;
        assert_eq!(
            payload
                .pointer("/next_question/question_key")
                .and_then(Value::as_str),
            Some("bankruptcy_status")
        );

        let session_id = payload
            .get("session_id")
            .and_then(Value::as_str)
            .expect("session id")
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/api/v1/sessions/{session_id}/answers"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({
                            "question_key": "bankruptcy_status",
                            "answer": "Current",
                        }))
                        .unwrap(),
                    ))
                    .unwrap(),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let payload = json_body(response).await;
        // A current bankruptcy fails the global knockout for every
        // seeded product.
        assert_eq!(payload.get("remaining_products"), Some(&json!(0)));
    }
}

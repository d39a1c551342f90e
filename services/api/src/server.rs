use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use loanscout::config::AppConfig;
use loanscout::error::AppError;
use loanscout::qualification::{QualificationService, SessionApi};
use loanscout::telemetry;

use crate::cli::ServeArgs;
use crate::infra::{seed_catalog, AppState, InMemorySessionStore};
use crate::routes::with_session_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = Arc::new(seed_catalog());
    let service = Arc::new(QualificationService::new(
        catalog.clone(),
        catalog,
        config.scoring.clone(),
    ));
    let sessions = Arc::new(InMemorySessionStore::default());

    let app = with_session_routes(SessionApi { service, sessions })
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan qualification service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

use crate::cli::ServeArgs;
use crate::infra::{extraction_adapter, AppState, Services};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lender_match::config::AppConfig;
use lender_match::error::AppError;
use lender_match::schema::{default_parameters, ParameterRegistry};
use lender_match::telemetry;
use lender_match::workflows::WorkflowDispatcher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Upper bound on records re-dispatched per workflow at startup.
const RESUME_LIMIT: usize = 1_000;

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let registry = Arc::new(ParameterRegistry::new());
    if config.matching.seed_parameters {
        let seeded = registry.seed(default_parameters());
        info!(seeded, "parameter registry seeded");
    }

    let services = Services::in_memory(
        registry,
        extraction_adapter(&config.extraction),
        WorkflowDispatcher::new(config.matching.worker_limit),
        config.extraction.timeout(),
    );

    match services.matching.resume_pending(RESUME_LIMIT) {
        Ok(count) if count > 0 => info!(count, "matching runs resumed"),
        Ok(_) => {}
        Err(error) => warn!(%error, "unable to resume matching runs"),
    }
    match services.ingestion.resume_pending(RESUME_LIMIT) {
        Ok(count) if count > 0 => info!(count, "guideline ingestions resumed"),
        Ok(_) => {}
        Err(error) => warn!(%error, "unable to resume guideline ingestions"),
    }

    let app = with_workflow_routes(&services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        workers = config.matching.worker_limit,
        "lender matching service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}

pub mod auth;
pub mod errors;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{DeskConfig, ServerConfig};
use crate::db::Database;
use crate::errors::DeskError;
use crate::notify::Notifier;
use crate::scanner::ScannerClient;
use crate::session::SessionStore;
use crate::workflow::ExceptionWorkflow;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DeskConfig>,
    pub db: Database,
    pub scanner: Arc<ScannerClient>,
    pub sessions: Arc<SessionStore>,
    pub notifier: Arc<Notifier>,
    pub workflow: Arc<ExceptionWorkflow>,
}

pub fn create_app_state(config: DeskConfig) -> Result<AppState, DeskError> {
    let db = Database::new(&config.database.path)?;
    build_app_state(config, db)
}

/// Assembles the shared state around an already-open database. Tests use
/// this with an in-memory store.
pub fn build_app_state(config: DeskConfig, db: Database) -> Result<AppState, DeskError> {
    let scanner = Arc::new(ScannerClient::new(&config.scanner)?);
    let notifier = Arc::new(Notifier::new(
        &config.notifications,
        config.scanner.timeout_secs,
    )?);
    let workflow = Arc::new(ExceptionWorkflow::new(db.clone(), Arc::clone(&notifier)));
    Ok(AppState {
        config: Arc::new(config),
        db,
        scanner,
        sessions: Arc::new(SessionStore::new()),
        notifier,
        workflow,
    })
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);
    Router::new()
        .route("/api/auth/login", axum::routing::post(routes::auth::login))
        .route("/api/auth/logout", axum::routing::post(routes::auth::logout))
        .route("/api/health", axum::routing::get(routes::health::health_check))
        .route(
            "/api/exception-requests",
            axum::routing::post(routes::exceptions::submit_request)
                .get(routes::exceptions::list_own),
        )
        .route(
            "/api/exception-requests/{id}",
            axum::routing::get(routes::exceptions::get_request)
                .put(routes::exceptions::decide_request),
        )
        .route(
            "/api/admin/exception-requests",
            axum::routing::get(routes::exceptions::list_all),
        )
        .route(
            "/api/admin/exception-requests/{id}/request-info",
            axum::routing::post(routes::exceptions::request_info),
        )
        .route(
            "/api/folders/my-scans",
            axum::routing::get(routes::folders::my_scans_folder),
        )
        .route(
            "/api/agent-groups",
            axum::routing::get(routes::groups::list_groups).post(routes::groups::create_group),
        )
        .route(
            "/api/agent-groups/{group_id}",
            axum::routing::get(routes::groups::group_details),
        )
        .route(
            "/api/agent-groups/{group_id}/agents/{agent_id}",
            axum::routing::delete(routes::groups::remove_agent),
        )
        .route("/api/scans", axum::routing::post(routes::scans::create_scan))
        .route(
            "/api/scans/check-existing",
            axum::routing::get(routes::scans::check_existing),
        )
        .route(
            "/api/scans/status/{scan_id}",
            axum::routing::get(routes::scans::scan_status),
        )
        .route(
            "/api/scans/find/{server_name}",
            axum::routing::get(routes::scans::find_scan),
        )
        .route(
            "/api/scans/{scan_id}/launch",
            axum::routing::post(routes::scans::launch_scan),
        )
        .route(
            "/api/scans/{scan_id}/stop",
            axum::routing::post(routes::scans::stop_scan),
        )
        .route(
            "/api/scans/{scan_id}/hosts/{host_id}/vulnerabilities",
            axum::routing::get(routes::vulns::host_vulnerabilities),
        )
        .route(
            "/api/external-scans",
            axum::routing::get(routes::external::list_external_scans)
                .post(routes::external::create_external_scan),
        )
        .route(
            "/api/external-scans/folder",
            axum::routing::get(routes::external::external_folder),
        )
        .route(
            "/api/external-scans/check-existing",
            axum::routing::get(routes::external::check_existing),
        )
        .route(
            "/api/external-scans/{scan_id}/stop",
            axum::routing::post(routes::external::stop_external_scan),
        )
        .route(
            "/api/external-scans/vulnerabilities/{server_name}",
            axum::routing::get(routes::external::external_vulnerabilities),
        )
        .route(
            "/api/external-scans/vulnerability-summary/{server_name}",
            axum::routing::get(routes::external::vulnerability_summary),
        )
        .route(
            "/api/vulnerability-details/{scan_id}/{host_id}/{plugin_id}",
            axum::routing::get(routes::vulns::plugin_details),
        )
        .route(
            "/api/scan-report/{server_name}",
            axum::routing::get(routes::reports::internal_report),
        )
        .route(
            "/api/external-scan-report/{server_name}",
            axum::routing::get(routes::reports::external_report),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    if let Some(origin) = server.cors_origin.as_deref() {
        if let Ok(value) = origin.parse::<HeaderValue>() {
            return CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any);
        }
        warn!(origin, "Unparseable CORS origin, falling back to permissive");
    }
    CorsLayer::permissive()
}

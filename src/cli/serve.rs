use std::path::Path;

use tracing::info;

use crate::api;
use crate::cli::commands::ServeArgs;
use crate::config;
use crate::errors::DeskError;

pub async fn handle_serve(args: ServeArgs) -> Result<(), DeskError> {
    let mut config = config::load_config(args.config.as_deref().map(Path::new)).await?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!(
        scanner = %config.scanner.url,
        database = %config.database.path,
        "Starting API server"
    );

    let state = api::create_app_state(config)?;
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| DeskError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

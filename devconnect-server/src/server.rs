use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tonic::transport::Server;
use tower_http::services::ServeDir;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::media_service::PUBLIC_STORAGE_PATH;
use crate::infrastructure::settings::Settings;
use crate::presentation::grpc::service::GrpcNotificationService;
use crate::presentation::middleware::layers::apply_http_layers;
use crate::presentation::openapi::ApiDoc;
use crate::presentation::{AppState, http_handlers};

pub(crate) async fn run_http(settings: &Settings, state: AppState) -> anyhow::Result<()> {
    let app = build_router(settings, state);
    let app = apply_http_layers(app, settings)?;

    let listener = TcpListener::bind(&settings.http_addr)
        .await
        .with_context(|| format!("cannot bind HTTP listener on {}", settings.http_addr))?;

    info!("HTTP server listening on {}", settings.http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server stopped");
    Ok(())
}

pub(crate) async fn run_grpc(settings: &Settings, state: AppState) -> anyhow::Result<()> {
    let addr = settings
        .grpc_addr
        .parse()
        .with_context(|| format!("invalid GRPC_ADDR '{}'", settings.grpc_addr))?;

    let service = GrpcNotificationService::new(state)
        .into_server()
        .max_decoding_message_size(settings.grpc_max_decoding_message_size_bytes)
        .max_encoding_message_size(settings.grpc_max_encoding_message_size_bytes);

    info!("gRPC server listening on {}", settings.grpc_addr);
    Server::builder()
        .concurrency_limit_per_connection(settings.grpc_concurrency_limit)
        .timeout(Duration::from_secs(settings.grpc_request_timeout_secs))
        .add_service(service)
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    info!("gRPC server stopped");
    Ok(())
}

/// API routes, Swagger UI and read-only access to uploaded files.
pub(crate) fn build_router(settings: &Settings, state: AppState) -> Router {
    http_handlers::routes(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest_service(PUBLIC_STORAGE_PATH, ServeDir::new(&settings.storage_dir))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

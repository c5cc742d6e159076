use memserve::{api, config, logging};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    tracing::info!("Starting memory server");
    let context = Arc::new(api::ServiceContext::initialize().await);
    let app = api::create_router(context.clone());

    let config = config::get_config();
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://{}:{}", config.host, config.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Shutting down");
    if let Some(mut context) = Arc::into_inner(context) {
        context.close();
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to listen for shutdown signal");
    }
}

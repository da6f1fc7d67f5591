//! Gateway entry point: env, logging, bind, serve.

use expertline_gateway::{api_router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = match AppState::from_env() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("expertline-gateway failed to start: {e}");
            std::process::exit(1);
        }
    };

    let bind = std::env::var("EXPERTLINE_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".to_string());
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {bind}: {e}");
            std::process::exit(1);
        }
    };
    info!(target: "expertline::gateway", "listening on {bind}");

    if let Err(e) = axum::serve(listener, api_router(state)).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

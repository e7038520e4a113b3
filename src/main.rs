use axum::http::{HeaderValue, Method};
use dotenvy::dotenv;
use log::info;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{self, CorsLayer, Origin};
use tower_http::trace::TraceLayer;

use laundromat::config::{ProcessEnv, SharedEnv};
use laundromat::routes;
use laundromat::upstream::client::UpstreamClient;

fn cors_layer() -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST])
        .allow_headers(cors::Any);

    let origins: Vec<HeaderValue> = env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if origins.is_empty() {
        layer.allow_origin(cors::Any)
    } else {
        layer.allow_origin(Origin::list(origins))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    // Set logging levels if not already set
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "laundromat=debug,tower_http=info");
    }

    // Initialize tracing with previously set logging levels
    tracing_subscriber::fmt::init();

    // Configuration is read from the live environment on every request
    let env_source: SharedEnv = Arc::new(ProcessEnv);

    let upstream_client = UpstreamClient::new()?;
    info!("Upstream client initialized");

    let app = routes::router(env_source, upstream_client).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer()),
    );

    // Bind and serve
    let addr: SocketAddr = env::var("BIND_ADDR")
        .ok()
        .and_then(|addr| addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));
    info!("Listening on http://{}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

use axum::{routing::get, Router};
use configuration::RateConfig;
use core_types::PriceCurrency;
use database::OrderStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer, ExposeHeaders},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

use error::AppError;

/// The shared application state that all handlers can access.
pub struct AppState {
    pub store: Arc<dyn OrderStore>,
    pub foreign_currency: String,
    pub local_currency: String,
}

impl AppState {
    pub fn new(store: Arc<dyn OrderStore>, rate: &RateConfig) -> Self {
        Self {
            store,
            foreign_currency: rate.foreign_currency.clone(),
            local_currency: rate.local_currency.clone(),
        }
    }

    /// Maps a `{currency}` path segment onto the price column it names.
    pub fn price_currency(&self, code: &str) -> Result<PriceCurrency, AppError> {
        if code.eq_ignore_ascii_case(&self.foreign_currency) {
            Ok(PriceCurrency::Foreign)
        } else if code.eq_ignore_ascii_case(&self.local_currency) {
            Ok(PriceCurrency::Local)
        } else {
            Err(AppError::NotFound(format!("unknown currency '{code}'")))
        }
    }
}

/// Builds the reporting API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any())
        .expose_headers(ExposeHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/orders", get(handlers::get_orders))
        .route("/api/accumulated-price/:currency", get(handlers::get_accumulated_price))
        .route("/api/total-price/:currency", get(handlers::get_total_price))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serves the reporting API on `addr` until the task is dropped.
pub async fn run_server(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    tracing::info!("Web server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

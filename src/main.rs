use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rainmakers_deal_sync::config::Config;
use rainmakers_deal_sync::deal_store::{DealStore, MemoryDealStore, PgDealStore};
use rainmakers_deal_sync::ghl_client::GhlClient;
use rainmakers_deal_sync::handlers::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rainmakers_deal_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Pick the deal store
    let store: Arc<dyn DealStore> = match &config.database_url {
        Some(url) => {
            let store = PgDealStore::connect(url).await?;
            tracing::info!("Database connection pool established");
            Arc::new(store)
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set; using the in-memory deal store (data is not persisted)"
            );
            Arc::new(MemoryDealStore::new())
        }
    };

    // GHL client is optional: without it, stage-by-ID webhooks leave the
    // stage unchanged (warned in Config::from_env).
    let ghl_client = match &config.ghl_api_key {
        Some(api_key) => {
            match GhlClient::new(config.ghl_base_url.clone(), api_key.clone()) {
                Ok(client) => {
                    tracing::info!("GHL client initialized: {}", config.ghl_base_url);
                    Some(client)
                }
                Err(e) => {
                    tracing::error!("Failed to initialize GHL client: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let app_state = Arc::new(AppState {
        store,
        config: config.clone(),
        ghl_client,
    });

    // Rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Webhook payloads are small; 2MB is generous
            .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting for the deployment platform
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::deal_store::DealStore;
use crate::errors::AppError;
use crate::ghl_client::GhlClient;
use crate::models::{Deal, DealFilterParams, DealStage, DealUpdate, StageCount, StageStats};
use crate::webhook_handler;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Deal persistence.
    pub store: Arc<dyn DealStore>,
    /// Application configuration.
    pub config: Config,
    /// GHL client for stage-by-ID lookups (optional).
    pub ghl_client: Option<GhlClient>,
}

/// All routes except the health check (which deployments probe without
/// rate limiting). `main` layers rate limiting and body limits on top.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Dashboard read API + portal write path
        .route("/api/v1/deals", get(list_deals).post(create_deal))
        .route("/api/v1/deals/stats", get(deal_stats))
        .route(
            "/api/v1/deals/:id",
            get(get_deal).patch(update_deal_fields),
        )
        // GHL webhook variants, one pipeline behind all of them
        .route("/webhooks/ghl", post(webhook_handler::ghl_webhook))
        .route(
            "/webhooks/ghl-opportunity-field-change",
            post(webhook_handler::ghl_webhook),
        )
        .route("/webhooks/test", post(webhook_handler::ghl_webhook))
}

/// The full application router without middleware layers. Integration
/// tests drive this directly.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rainmakers-deal-sync",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// GET /api/v1/deals
///
/// Deal list for the admin dashboard, with optional stage/status/owner
/// filters.
pub async fn list_deals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DealFilterParams>,
) -> Result<Json<Vec<Deal>>, AppError> {
    let deals = state.store.get_all_deals().await?;

    let filtered = deals
        .into_iter()
        .filter(|deal| {
            params
                .stage
                .as_deref()
                .map_or(true, |stage| deal.stage.as_deref() == Some(stage))
                && params
                    .status
                    .as_deref()
                    .map_or(true, |status| deal.status.as_deref() == Some(status))
                && params
                    .owner
                    .as_deref()
                    .map_or(true, |owner| deal.owner.as_deref() == Some(owner))
        })
        .collect();

    Ok(Json(filtered))
}

/// GET /api/v1/deals/:id
pub async fn get_deal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Deal>, AppError> {
    let deal = state
        .store
        .get_deal_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", id)))?;

    Ok(Json(deal))
}

/// POST /api/v1/deals
///
/// Portal user creates a deal. The store assigns the opaque ID; the body
/// is the same partial-fields shape the reconciler writes.
pub async fn create_deal(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<DealUpdate>,
) -> Result<(StatusCode, Json<Deal>), AppError> {
    if fields.contains("id") {
        return Err(AppError::BadRequest(
            "Deal IDs are store-assigned".to_string(),
        ));
    }

    let mut deal = Deal::new(Uuid::new_v4().to_string());
    deal.apply_update(&fields)
        .map_err(|e| AppError::BadRequest(format!("Invalid deal fields: {}", e)))?;

    state.store.insert_deal(&deal).await?;
    tracing::info!(deal_id = %deal.id, "deal created");

    Ok((StatusCode::CREATED, Json(deal)))
}

/// PATCH /api/v1/deals/:id
///
/// Direct edit by the owning user. Same last-write-wins semantics as the
/// webhook path.
pub async fn update_deal_fields(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(fields): Json<DealUpdate>,
) -> Result<Json<Deal>, AppError> {
    if fields.is_empty() {
        return Err(AppError::BadRequest("Empty update".to_string()));
    }
    if fields.contains("id") {
        return Err(AppError::BadRequest(
            "Deal IDs cannot be changed".to_string(),
        ));
    }

    state.store.update_deal(&id, &fields).await?;

    let deal = state
        .store
        .get_deal_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", id)))?;

    Ok(Json(deal))
}

/// GET /api/v1/deals/stats
///
/// Per-stage counts for the dashboard analytics view. Canonical stages
/// are always listed (zero counts included); non-canonical stage labels
/// that drifted in are appended so they stay visible.
pub async fn deal_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StageStats>, AppError> {
    let deals = state.store.get_all_deals().await?;
    let total = deals.len();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for deal in &deals {
        if let Some(stage) = deal.stage.as_deref() {
            *counts.entry(stage).or_default() += 1;
        }
    }

    let mut stages: Vec<StageCount> = DealStage::ALL
        .iter()
        .map(|stage| StageCount {
            stage: stage.as_str().to_string(),
            count: counts.remove(stage.as_str()).unwrap_or(0),
        })
        .collect();

    let mut drifted: Vec<(&str, usize)> = counts.into_iter().collect();
    drifted.sort();
    for (stage, count) in drifted {
        stages.push(StageCount {
            stage: stage.to_string(),
            count,
        });
    }

    Ok(Json(StageStats { total, stages }))
}

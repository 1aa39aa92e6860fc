use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::matcher::{find_deal, DEFAULT_MATCH_CHAIN};
use crate::reconciler::reconcile;
use crate::webhook_models::{OpportunityEvent, WebhookPayload, WebhookResponse};

/// GHL opportunity webhook handler.
///
/// One pipeline serves all webhook route variants:
/// validate secret → validate payload → match → resolve stage label →
/// reconcile → persist → respond.
///
/// An event that matches no deal is answered with 200 success (not an
/// error) so the CRM does not retry it; deals are never auto-created here.
/// Store or stage-lookup failures surface as 500 with no internal retry:
/// the CRM's own webhook retry policy is the recovery mechanism.
pub async fn ghl_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    validate_webhook_secret(&state, &headers)?;

    let event = payload.into_opportunity();
    if !event.has_identity() {
        return Err(AppError::BadRequest(
            "Missing opportunity payload".to_string(),
        ));
    }

    tracing::info!(
        opportunity_id = event.id.as_deref().unwrap_or("-"),
        opportunity_name = event.name.as_deref().unwrap_or("-"),
        "received GHL opportunity webhook"
    );

    let deals = state.store.get_all_deals().await?;
    let Some(deal) = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN) else {
        tracing::info!(
            opportunity_id = event.id.as_deref().unwrap_or("-"),
            "no matching deal for inbound opportunity; dropping event"
        );
        return Ok((StatusCode::OK, Json(WebhookResponse::no_match())));
    };

    let stage_label = resolve_stage_label(&state, &event).await?;

    let update = reconcile(deal, &event, stage_label.as_deref(), Utc::now())
        .map_err(|e| AppError::Internal(format!("Reconciliation failed: {}", e)))?;

    if update.is_empty() {
        tracing::debug!(deal_id = %deal.id, "event carried no changes");
        return Ok((
            StatusCode::OK,
            Json(WebhookResponse::no_changes(deal.id.clone())),
        ));
    }

    let deal_id = deal.id.clone();
    // The deal was read in this same request; losing it mid-request is an
    // internal inconsistency, not a 404 the CRM can act on.
    state
        .store
        .update_deal(&deal_id, &update)
        .await
        .map_err(|e| match e {
            AppError::NotFound(msg) => AppError::Internal(msg),
            other => other,
        })?;

    tracing::info!(
        deal_id = %deal_id,
        fields = update.len(),
        "deal updated from GHL webhook"
    );

    Ok((
        StatusCode::OK,
        Json(WebhookResponse::updated(deal_id, update.into_inner())),
    ))
}

/// Resolve the external stage label for an event.
///
/// Prefers a label delivered in the payload; falls back to the GHL
/// pipelines lookup when only `(pipelineId, stageId)` is present. Returns
/// `None` (stage untouched) when the event says nothing about stage or the
/// lookup cannot run.
async fn resolve_stage_label(
    state: &AppState,
    event: &OpportunityEvent,
) -> Result<Option<String>, AppError> {
    if let Some(name) = &event.pipeline_stage_name {
        return Ok(Some(name.clone()));
    }

    let (Some(pipeline_id), Some(stage_id)) = (&event.pipeline_id, &event.pipeline_stage_id)
    else {
        return Ok(None);
    };

    let Some(client) = &state.ghl_client else {
        tracing::warn!(
            pipeline_id,
            stage_id,
            "webhook sent stage IDs but no GHL client is configured; stage left unchanged"
        );
        return Ok(None);
    };

    client.get_stage_name_by_id(pipeline_id, stage_id).await
}

/// Validate the shared secret from the `X-Webhook-Secret` header.
///
/// Skipped entirely when no secret is configured (warned at startup).
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(ref expected) = state.config.webhook_secret else {
        return Ok(());
    };

    let secret = headers
        .get("X-Webhook-Secret")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Secret header".to_string()))?;

    if !constant_time_compare(secret, expected) {
        tracing::warn!("Invalid webhook secret received");
        return Err(AppError::Unauthorized(
            "Invalid webhook secret".to_string(),
        ));
    }

    Ok(())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

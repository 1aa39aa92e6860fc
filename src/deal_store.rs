use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{Deal, DealUpdate};

/// Persistence seam for deal records.
///
/// The reconciler treats this as an opaque document store: whole-document
/// reads plus partial-field writes. `get_all_deals` is the matcher's
/// linear-scan read path; there is no indexed lookup by external ID.
#[async_trait]
pub trait DealStore: Send + Sync {
    async fn get_all_deals(&self) -> Result<Vec<Deal>, AppError>;
    async fn get_deal_by_id(&self, id: &str) -> Result<Option<Deal>, AppError>;
    async fn insert_deal(&self, deal: &Deal) -> Result<(), AppError>;
    /// Apply a partial update. Only set keys are written; last write wins.
    /// Updates whose merge result would no longer deserialize as a [`Deal`]
    /// are rejected with `BadRequest`, leaving the document unchanged.
    async fn update_deal(&self, id: &str, update: &DealUpdate) -> Result<(), AppError>;
}

/// Postgres-backed store: one JSONB document per deal.
pub struct PgDealStore {
    pool: PgPool,
}

impl PgDealStore {
    /// Connect and make sure the deals table exists.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS deals (
                id          TEXT PRIMARY KEY,
                doc         JSONB NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DealStore for PgDealStore {
    async fn get_all_deals(&self) -> Result<Vec<Deal>, AppError> {
        let docs = sqlx::query_scalar::<_, Value>("SELECT doc FROM deals ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        docs.into_iter()
            .map(|doc| {
                serde_json::from_value(doc)
                    .map_err(|e| AppError::Internal(format!("Malformed deal document: {}", e)))
            })
            .collect()
    }

    async fn get_deal_by_id(&self, id: &str) -> Result<Option<Deal>, AppError> {
        let doc = sqlx::query_scalar::<_, Value>("SELECT doc FROM deals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        doc.map(|doc| {
            serde_json::from_value(doc)
                .map_err(|e| AppError::Internal(format!("Malformed deal document: {}", e)))
        })
        .transpose()
    }

    async fn insert_deal(&self, deal: &Deal) -> Result<(), AppError> {
        let doc = serde_json::to_value(deal)
            .map_err(|e| AppError::Internal(format!("Failed to serialize deal: {}", e)))?;

        sqlx::query("INSERT INTO deals (id, doc) VALUES ($1, $2)")
            .bind(&deal.id)
            .bind(doc)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_deal(&self, id: &str, update: &DealUpdate) -> Result<(), AppError> {
        let mut fields = update.as_map().clone();
        fields.insert(
            "updatedAt".to_string(),
            serde_json::to_value(Utc::now())
                .map_err(|e| AppError::Internal(format!("Failed to serialize timestamp: {}", e)))?,
        );
        let patch = Value::Object(fields);

        // Every stored doc must keep deserializing as a Deal. Check the
        // merge result before committing it, so a type-mismatched field
        // is rejected instead of corrupting the document.
        let merged = sqlx::query_scalar::<_, Value>("SELECT doc || $2 FROM deals WHERE id = $1")
            .bind(id)
            .bind(patch.clone())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", id)))?;
        serde_json::from_value::<Deal>(merged)
            .map_err(|e| AppError::BadRequest(format!("Invalid deal fields: {}", e)))?;

        sqlx::query("UPDATE deals SET doc = doc || $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(patch)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// In-memory store used when no `DATABASE_URL` is configured, and by the
/// integration tests.
#[derive(Default)]
pub struct MemoryDealStore {
    deals: RwLock<HashMap<String, Deal>>,
}

impl MemoryDealStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn get_all_deals(&self) -> Result<Vec<Deal>, AppError> {
        let deals = self.deals.read().await;
        let mut all: Vec<Deal> = deals.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn get_deal_by_id(&self, id: &str) -> Result<Option<Deal>, AppError> {
        Ok(self.deals.read().await.get(id).cloned())
    }

    async fn insert_deal(&self, deal: &Deal) -> Result<(), AppError> {
        self.deals
            .write()
            .await
            .insert(deal.id.clone(), deal.clone());
        Ok(())
    }

    async fn update_deal(&self, id: &str, update: &DealUpdate) -> Result<(), AppError> {
        let mut deals = self.deals.write().await;
        let deal = deals
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Deal {} not found", id)))?;

        // apply_update leaves the deal untouched on failure, matching the
        // Postgres store's validate-before-commit behavior.
        deal.apply_update(update)
            .map_err(|e| AppError::BadRequest(format!("Invalid deal fields: {}", e)))?;
        deal.updated_at = Some(Utc::now());
        Ok(())
    }
}

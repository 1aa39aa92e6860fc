use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string. When unset the service falls back to
    /// the in-memory deal store (local runs only).
    pub database_url: Option<String>,
    pub port: u16,
    /// GHL REST API key. When unset, stage-by-ID lookups are disabled and
    /// webhooks that carry `(pipelineId, stageId)` instead of a stage
    /// label cannot update the stage.
    pub ghl_api_key: Option<String>,
    pub ghl_base_url: String,
    /// Shared secret checked against the `X-Webhook-Secret` header. When
    /// unset the webhook endpoints are fully unauthenticated; this is
    /// allowed but warned about at startup.
    pub webhook_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            ghl_api_key: std::env::var("GHL_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            ghl_base_url: std::env::var("GHL_BASE_URL")
                .unwrap_or_else(|_| "https://rest.gohighlevel.com".to_string()),
            webhook_secret: std::env::var("WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        };

        if !config.ghl_base_url.starts_with("http://")
            && !config.ghl_base_url.starts_with("https://")
        {
            anyhow::bail!("GHL_BASE_URL must start with http:// or https://");
        }

        if config.webhook_secret.is_none() {
            tracing::warn!(
                "WEBHOOK_SECRET is not set: webhook endpoints will accept unauthenticated \
                 requests. Set WEBHOOK_SECRET in any deployment reachable from the internet."
            );
        }
        if config.ghl_api_key.is_none() {
            tracing::warn!(
                "GHL_API_KEY is not set: stage-by-ID lookups are disabled; webhooks that send \
                 stage IDs instead of labels will not update the deal stage"
            );
        }
        if let Some(ref url) = config.database_url {
            tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]);
        }
        tracing::debug!("GHL base URL: {}", config.ghl_base_url);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }
}

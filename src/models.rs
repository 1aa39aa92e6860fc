use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical pipeline stages, in pipeline order.
///
/// `Deal.stage` is stored as a string so unknown CRM labels can pass through
/// the normalizer unchanged, but every stage written by this service should
/// be one of these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DealStage {
    Qualification,
    NeedsAnalysis,
    LenderSubmission,
    Proposal,
    SignedProposal,
    Underwriting,
}

impl DealStage {
    /// All canonical stages in pipeline order.
    pub const ALL: [DealStage; 6] = [
        DealStage::Qualification,
        DealStage::NeedsAnalysis,
        DealStage::LenderSubmission,
        DealStage::Proposal,
        DealStage::SignedProposal,
        DealStage::Underwriting,
    ];

    /// The canonical label stored in `Deal.stage`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Qualification => "Qualification",
            DealStage::NeedsAnalysis => "Needs Analysis",
            DealStage::LenderSubmission => "Lender Submission",
            DealStage::Proposal => "Proposal",
            DealStage::SignedProposal => "Signed Proposal",
            DealStage::Underwriting => "Underwriting",
        }
    }
}

/// A portal deal record.
///
/// A flat bag of optional attributes; the only required field is the
/// store-assigned `id`. External identity hints (`deal_id`,
/// `ghl_opportunity_id`, the property name fields) are what the matcher
/// scans. No cross-field invariants are enforced here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    /// Store-assigned opaque ID.
    pub id: String,

    // External identity hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghl_opportunity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghl_pipeline_id: Option<String>,

    // Descriptive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_zip: Option<String>,

    // Loan terms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_term_months: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ltv: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dscr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_is_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stabilized_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rehab_budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_value: Option<f64>,

    // Sponsor financials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_net_worth: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_liquidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_credit_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_experience: Option<String>,

    // Contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_username: Option<String>,

    // CRM bookkeeping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opportunity_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lost_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    // Workflow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Deal {
    /// Create a fresh portal deal in the first pipeline stage.
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Deal {
            id,
            stage: Some(DealStage::Qualification.as_str().to_string()),
            stage_last_updated: Some(now),
            created_at: Some(now),
            updated_at: Some(now),
            ..Deal::default()
        }
    }

    /// Merge a partial update into this deal.
    ///
    /// The update carries only set keys (never JSON nulls), so merging at
    /// the JSON level matches the Postgres store's `doc || update` semantics.
    pub fn apply_update(&mut self, update: &DealUpdate) -> serde_json::Result<()> {
        let mut doc = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in update.as_map() {
            doc.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(doc))?;
        Ok(())
    }
}

/// A partial deal update: a JSON object holding only the fields to write.
///
/// Keys use the same camelCase names as the serialized `Deal`, so the
/// Postgres store can apply the update with a plain JSONB merge and the
/// in-memory store via `Deal::apply_update`. Unset fields are simply
/// absent; the store never sees nulls.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealUpdate(Map<String, Value>);

impl DealUpdate {
    pub fn new() -> Self {
        DealUpdate(Map::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Set a field. JSON nulls are refused; the store does not accept them.
    pub fn set(&mut self, key: &str, value: Value) {
        if !value.is_null() {
            self.0.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Filter parameters for the dashboard deal list.
#[derive(Debug, Default, Deserialize)]
pub struct DealFilterParams {
    pub stage: Option<String>,
    pub status: Option<String>,
    pub owner: Option<String>,
}

/// Per-stage deal counts for the dashboard analytics view.
#[derive(Debug, Serialize)]
pub struct StageStats {
    pub total: usize,
    pub stages: Vec<StageCount>,
}

#[derive(Debug, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: usize,
}

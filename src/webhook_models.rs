use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inbound GHL webhook body.
///
/// GHL delivers the opportunity either wrapped (`{"opportunity": {...}}`)
/// or flattened at the top level, depending on which trigger fired.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Wrapped { opportunity: OpportunityEvent },
    Flat(OpportunityEvent),
}

impl WebhookPayload {
    /// Unwrap to the opportunity event for uniform processing.
    pub fn into_opportunity(self) -> OpportunityEvent {
        match self {
            WebhookPayload::Wrapped { opportunity } => opportunity,
            WebhookPayload::Flat(event) => event,
        }
    }
}

/// An opportunity event from the CRM.
///
/// Every field is optional; the controller rejects events that carry
/// neither an opportunity ID nor a name. Unknown keys are preserved in
/// `raw` so the reconciler's top-level mapping table can still see them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OpportunityEvent {
    pub id: Option<String>,
    #[serde(alias = "opportunityName")]
    pub name: Option<String>,
    pub monetary_value: Option<f64>,
    pub pipeline_id: Option<String>,
    #[serde(alias = "stageId")]
    pub pipeline_stage_id: Option<String>,
    #[serde(alias = "stageName")]
    pub pipeline_stage_name: Option<String>,
    pub status: Option<String>,
    pub source: Option<String>,
    pub assigned_to: Option<String>,
    pub lost_reason: Option<String>,
    pub tags: Option<Vec<String>>,
    pub contact: Option<ContactInfo>,
    #[serde(deserialize_with = "custom_fields_or_empty")]
    pub custom_fields: CustomFields,

    /// Any additional keys the CRM sent.
    #[serde(flatten)]
    pub raw: Value,
}

impl Default for OpportunityEvent {
    fn default() -> Self {
        OpportunityEvent {
            id: None,
            name: None,
            monetary_value: None,
            pipeline_id: None,
            pipeline_stage_id: None,
            pipeline_stage_name: None,
            status: None,
            source: None,
            assigned_to: None,
            lost_reason: None,
            tags: None,
            contact: None,
            custom_fields: CustomFields::default(),
            // Flattened fields must serialize as a map, never null.
            raw: Value::Object(Map::new()),
        }
    }
}

impl OpportunityEvent {
    /// True when the event carries no usable identity at all.
    pub fn has_identity(&self) -> bool {
        self.id.is_some() || self.name.is_some()
    }
}

/// GHL sends `"customFields": null` when the record has none; treat that
/// the same as an absent key.
fn custom_fields_or_empty<'de, D>(deserializer: D) -> Result<CustomFields, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<CustomFields>::deserialize(deserializer)?.unwrap_or_default())
}

/// Contact block nested in the opportunity event.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInfo {
    #[serde(alias = "fullName", alias = "full_name")]
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,

    #[serde(flatten)]
    pub raw: Value,
}

impl Default for ContactInfo {
    fn default() -> Self {
        ContactInfo {
            name: None,
            email: None,
            phone: None,
            company_name: None,
            raw: Value::Object(Map::new()),
        }
    }
}

/// CRM custom fields: either a key→value map or a list of entries,
/// depending on the webhook variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CustomFields {
    Map(Map<String, Value>),
    List(Vec<CustomFieldEntry>),
}

impl Default for CustomFields {
    fn default() -> Self {
        CustomFields::Map(Map::new())
    }
}

impl CustomFields {
    /// Iterate as (external key, value) pairs. List entries without a key
    /// fall back to the field ID; entries with neither are skipped.
    pub fn pairs(&self) -> Vec<(&str, &Value)> {
        match self {
            CustomFields::Map(map) => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
            CustomFields::List(entries) => entries
                .iter()
                .filter_map(|e| {
                    e.key
                        .as_deref()
                        .or(e.id.as_deref())
                        .map(|k| (k, &e.value))
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CustomFields::Map(map) => map.is_empty(),
            CustomFields::List(entries) => entries.is_empty(),
        }
    }
}

/// One entry of the list-shaped custom-fields collection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomFieldEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "fieldKey", alias = "field_key")]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// Response body for the webhook endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<Map<String, Value>>,
}

impl WebhookResponse {
    pub fn no_match() -> Self {
        WebhookResponse {
            success: true,
            message: Some("no matching deal".to_string()),
            deal_id: None,
            updates: None,
        }
    }

    pub fn no_changes(deal_id: String) -> Self {
        WebhookResponse {
            success: true,
            message: Some("no changes".to_string()),
            deal_id: Some(deal_id),
            updates: None,
        }
    }

    pub fn updated(deal_id: String, updates: Map<String, Value>) -> Self {
        WebhookResponse {
            success: true,
            message: None,
            deal_id: Some(deal_id),
            updates: Some(updates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wrapped_payload() {
        let json = r#"
        {
            "opportunity": {
                "id": "opp-1",
                "name": "123 Main St",
                "monetaryValue": 500000,
                "pipelineStageId": "stage-9",
                "pipelineId": "pipe-1"
            }
        }
        "#;

        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        let event = payload.into_opportunity();
        assert_eq!(event.id.as_deref(), Some("opp-1"));
        assert_eq!(event.monetary_value, Some(500000.0));
        assert_eq!(event.pipeline_stage_id.as_deref(), Some("stage-9"));
    }

    #[test]
    fn parse_flattened_payload() {
        let json = r#"{"id": "opp-2", "stageName": "Underwriting Stage", "weird_extra": 1}"#;

        let payload: WebhookPayload = serde_json::from_str(json).unwrap();
        let event = payload.into_opportunity();
        assert_eq!(event.id.as_deref(), Some("opp-2"));
        assert_eq!(event.pipeline_stage_name.as_deref(), Some("Underwriting Stage"));
        assert_eq!(event.raw.get("weird_extra"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn parse_custom_fields_map_and_list() {
        let map_json = r#"{"id": "x", "customFields": {"opportunity.ltv": "65"}}"#;
        let event = serde_json::from_str::<WebhookPayload>(map_json)
            .unwrap()
            .into_opportunity();
        let pairs = event.custom_fields.pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, "opportunity.ltv");

        let list_json = r#"
        {
            "id": "x",
            "customFields": [
                {"id": "f1", "fieldKey": "opportunity.noi", "value": "120000"},
                {"id": "f2", "value": "orphan"}
            ]
        }
        "#;
        let event = serde_json::from_str::<WebhookPayload>(list_json)
            .unwrap()
            .into_opportunity();
        let pairs = event.custom_fields.pairs();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, "opportunity.noi");
        // No key: falls back to the field ID.
        assert_eq!(pairs[1].0, "f2");
    }

    #[test]
    fn null_custom_fields_parse_as_empty() {
        let json = r#"{"id": "opp-3", "stageName": "Proposal Stage", "customFields": null}"#;

        let event = serde_json::from_str::<WebhookPayload>(json)
            .unwrap()
            .into_opportunity();
        assert_eq!(event.id.as_deref(), Some("opp-3"));
        assert!(event.custom_fields.is_empty());
    }

    #[test]
    fn empty_object_has_no_identity() {
        let event = serde_json::from_str::<WebhookPayload>("{}")
            .unwrap()
            .into_opportunity();
        assert!(!event.has_identity());
    }
}

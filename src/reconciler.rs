use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{Deal, DealUpdate};
use crate::stage::normalize_stage;
use crate::webhook_models::OpportunityEvent;

/// Top-level opportunity keys → internal deal fields.
///
/// Dotted external keys navigate into nested payload objects. This table
/// (with [`CUSTOM_FIELD_MAP`]) is the single source of truth for the
/// schema boundary: anything the CRM sends that is not listed here is
/// dropped.
pub const OPPORTUNITY_FIELD_MAP: &[(&str, &str)] = &[
    ("id", "ghlOpportunityId"),
    ("name", "title"),
    ("monetaryValue", "opportunityValue"),
    ("pipelineId", "ghlPipelineId"),
    ("status", "status"),
    ("source", "opportunitySource"),
    ("assignedTo", "owner"),
    ("lostReason", "lostReason"),
    ("tags", "tags"),
    ("contact.name", "contactName"),
    ("contact.email", "contactEmail"),
    ("contact.phone", "contactPhone"),
    ("contact.companyName", "sponsorName"),
];

/// Namespaced custom-field keys → internal deal fields.
pub const CUSTOM_FIELD_MAP: &[(&str, &str)] = &[
    ("opportunity.deal_id", "dealId"),
    ("opportunity.property_address", "propertyAddress"),
    ("opportunity.property_name", "propertyName"),
    ("opportunity.property_type", "propertyType"),
    ("opportunity.property_city", "propertyCity"),
    ("opportunity.property_state", "propertyState"),
    ("opportunity.property_zip", "propertyZip"),
    ("opportunity.loan_amount", "loanAmount"),
    ("opportunity.loan_type", "loanType"),
    ("opportunity.loan_purpose", "loanPurpose"),
    ("opportunity.loan_term", "loanTermMonths"),
    ("opportunity.interest_rate", "interestRate"),
    ("opportunity.ltv", "ltv"),
    ("opportunity.noi", "noi"),
    ("opportunity.dscr", "dscr"),
    ("opportunity.occupancy_rate", "occupancyRate"),
    ("opportunity.purchase_price", "purchasePrice"),
    ("opportunity.as_is_value", "asIsValue"),
    ("opportunity.stabilized_value", "stabilizedValue"),
    ("opportunity.rehab_budget", "rehabBudget"),
    ("opportunity.exit_strategy", "exitStrategy"),
    ("opportunity.notes", "notes"),
    ("contact.sponsor_net_worth", "sponsorNetWorth"),
    ("contact.sponsor_liquidity", "sponsorLiquidity"),
    ("contact.credit_score", "sponsorCreditScore"),
    ("contact.sponsor_experience", "sponsorExperience"),
    ("contact.discord_username", "discordUsername"),
];

/// Internal fields typed as numbers on the deal. Custom-field values
/// arrive as strings and are coerced before the diff; values that do not
/// parse are skipped rather than written.
const NUMERIC_FIELDS: &[&str] = &[
    "loanAmount",
    "loanTermMonths",
    "interestRate",
    "ltv",
    "noi",
    "dscr",
    "occupancyRate",
    "purchasePrice",
    "asIsValue",
    "stabilizedValue",
    "rehabBudget",
    "opportunityValue",
    "sponsorNetWorth",
    "sponsorLiquidity",
    "sponsorCreditScore",
];

/// Compute the minimal update set for a matched deal.
///
/// Pure: reads the deal and the event, writes nothing. A field enters the
/// update set only when the external value is present, non-empty, and
/// differs from the deal's current value (value-level diff). Stage is
/// handled last: `stage_label` is the already-resolved external label
/// (the controller performs the pipeline/stage ID lookup when the webhook
/// carries IDs instead of a label); a stage change always pairs `stage`
/// with a fresh `stageLastUpdated`.
pub fn reconcile(
    deal: &Deal,
    event: &OpportunityEvent,
    stage_label: Option<&str>,
    now: DateTime<Utc>,
) -> serde_json::Result<DealUpdate> {
    let deal_doc = as_object(serde_json::to_value(deal)?);
    let event_doc = as_object(serde_json::to_value(event)?);

    let mut update = DealUpdate::new();

    for (external, internal) in OPPORTUNITY_FIELD_MAP {
        if let Some(value) = lookup_path(&event_doc, external) {
            consider_field(&mut update, &deal_doc, internal, value);
        }
    }

    for (key, value) in event.custom_fields.pairs() {
        match CUSTOM_FIELD_MAP.iter().find(|(external, _)| *external == key) {
            Some((_, internal)) => consider_field(&mut update, &deal_doc, internal, value),
            None => {
                tracing::debug!(key, "dropping unmapped custom field");
            }
        }
    }

    if let Some(label) = stage_label {
        let normalized = normalize_stage(label);
        if deal.stage.as_deref() != Some(normalized.as_str()) {
            update.set("stage", Value::String(normalized));
            update.set("stageLastUpdated", serde_json::to_value(now)?);
        }
    }

    Ok(update)
}

/// Add `internal = value` to the update set if the value is usable and
/// differs from the deal's current value.
fn consider_field(
    update: &mut DealUpdate,
    deal_doc: &Map<String, Value>,
    internal: &str,
    value: &Value,
) {
    if is_empty_value(value) {
        return;
    }

    let candidate = if NUMERIC_FIELDS.contains(&internal) {
        match coerce_numeric(value) {
            Some(number) => number,
            None => {
                tracing::debug!(field = internal, "skipping non-numeric value for numeric field");
                return;
            }
        }
    } else {
        value.clone()
    };

    let unchanged = deal_doc
        .get(internal)
        .is_some_and(|current| values_equal(current, &candidate));
    if !unchanged {
        update.set(internal, candidate);
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Resolve a possibly dotted key ("contact.email") against a JSON object.
fn lookup_path<'a>(doc: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Absent, blank, or empty collection values never enter the update set.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Numbers compare by value, so the CRM's integer 500000 equals a stored
/// 500000.0 and does not produce a redundant write.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Coerce a CRM value into a JSON number, tolerating currency formatting.
fn coerce_numeric(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | '%' | ' '))
                .collect();
            cleaned
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

//! Reconciliation pipeline tests over the library API: matcher, stage
//! normalizer, and reconciler working together the way the webhook
//! controller drives them.

use chrono::Utc;
use serde_json::{json, Value};

use rainmakers_deal_sync::matcher::{find_deal, DEFAULT_MATCH_CHAIN};
use rainmakers_deal_sync::models::Deal;
use rainmakers_deal_sync::reconciler::reconcile;
use rainmakers_deal_sync::stage::normalize_stage;
use rainmakers_deal_sync::webhook_models::WebhookPayload;

fn parse_event(body: Value) -> rainmakers_deal_sync::webhook_models::OpportunityEvent {
    serde_json::from_value::<WebhookPayload>(body)
        .unwrap()
        .into_opportunity()
}

#[test]
fn normalizer_contract() {
    assert_eq!(normalize_stage("Initial Qualification Stage"), "Qualification");
    assert_eq!(normalize_stage("underwriting"), "Underwriting");
    assert_eq!(normalize_stage("Bespoke Custom Stage"), "Bespoke Custom Stage");
}

#[test]
fn match_then_reconcile_then_redeliver() {
    // A deal known only by its business code: matched on tier 2, after
    // which the reconciler backfills the authoritative opportunity ID.
    let mut deal = Deal::new("d-2".to_string());
    deal.deal_id = Some("D-2".to_string());
    let deals = vec![deal];

    let event = parse_event(json!({
        "opportunity": {
            "id": "ext-99",
            "name": "D-2",
            "monetaryValue": 1_250_000,
            "stageName": "Needs Analysis Stage",
            "customFields": {
                "opportunity.property_address": "88 Elm Ave",
                "opportunity.ltv": "72.5",
                "opportunity.not_in_schema": "dropped"
            }
        }
    }));

    let matched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    let now = Utc::now();
    let update = reconcile(matched, &event, Some("Needs Analysis Stage"), now).unwrap();

    assert_eq!(update.get("ghlOpportunityId"), Some(&json!("ext-99")));
    assert_eq!(update.get("title"), Some(&json!("D-2")));
    assert_eq!(update.get("opportunityValue"), Some(&json!(1_250_000.0)));
    assert_eq!(update.get("propertyAddress"), Some(&json!("88 Elm Ave")));
    assert_eq!(update.get("ltv"), Some(&json!(72.5)));
    assert_eq!(update.get("stage"), Some(&json!("Needs Analysis")));
    assert!(update.contains("stageLastUpdated"));
    assert!(!update.contains("notInSchema"));

    // Apply and redeliver: the same event now reconciles to nothing.
    let mut updated = deals[0].clone();
    updated.apply_update(&update).unwrap();

    // The backfilled ID makes redelivery match on tier 1.
    let deals = vec![updated];
    let rematched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    assert_eq!(rematched.ghl_opportunity_id.as_deref(), Some("ext-99"));

    let second = reconcile(rematched, &event, Some("Needs Analysis Stage"), Utc::now()).unwrap();
    assert!(second.is_empty(), "redelivery produced {:?}", second);
}

#[test]
fn stage_only_event_updates_stage_and_timestamp_together() {
    let mut deal = Deal::new("d-1".to_string());
    deal.ghl_opportunity_id = Some("ext-1".to_string());
    deal.stage = Some("Qualification".to_string());
    let deals = vec![deal];

    let event = parse_event(json!({"id": "ext-1", "stageName": "Lender Submission Stage"}));

    let matched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    let update = reconcile(matched, &event, Some("Lender Submission Stage"), Utc::now()).unwrap();

    assert_eq!(update.len(), 2);
    assert_eq!(update.get("stage"), Some(&json!("Lender Submission")));
    assert!(update.contains("stageLastUpdated"));
}

#[test]
fn unknown_stage_label_passes_through_to_the_deal() {
    // Deliberate escape hatch: an unrecognized CRM stage stays visible
    // instead of being dropped.
    let mut deal = Deal::new("d-1".to_string());
    deal.ghl_opportunity_id = Some("ext-1".to_string());
    let deals = vec![deal];

    let event = parse_event(json!({"id": "ext-1"}));
    let matched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    let update = reconcile(matched, &event, Some("Regional Review"), Utc::now()).unwrap();

    assert_eq!(update.get("stage"), Some(&json!("Regional Review")));
    assert!(update.contains("stageLastUpdated"));
}

#[test]
fn contact_block_maps_to_contact_fields() {
    let mut deal = Deal::new("d-1".to_string());
    deal.ghl_opportunity_id = Some("ext-1".to_string());
    let deals = vec![deal];

    let event = parse_event(json!({
        "opportunity": {
            "id": "ext-1",
            "contact": {
                "name": "Jordan Blake",
                "email": "jordan@example.com",
                "phone": "+15125550100",
                "companyName": "Blake Capital"
            }
        }
    }));

    let matched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    let update = reconcile(matched, &event, None, Utc::now()).unwrap();

    assert_eq!(update.get("contactName"), Some(&json!("Jordan Blake")));
    assert_eq!(update.get("contactEmail"), Some(&json!("jordan@example.com")));
    assert_eq!(update.get("contactPhone"), Some(&json!("+15125550100")));
    assert_eq!(update.get("sponsorName"), Some(&json!("Blake Capital")));
}

#[test]
fn list_shaped_custom_fields_reconcile_like_map_shaped() {
    let mut deal = Deal::new("d-1".to_string());
    deal.ghl_opportunity_id = Some("ext-1".to_string());
    let deals = vec![deal];

    let event = parse_event(json!({
        "opportunity": {
            "id": "ext-1",
            "customFields": [
                {"id": "f1", "fieldKey": "opportunity.loan_amount", "value": "$3,100,000"},
                {"id": "f2", "fieldKey": "opportunity.exit_strategy", "value": "Refinance"}
            ]
        }
    }));

    let matched = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN).unwrap();
    let update = reconcile(matched, &event, None, Utc::now()).unwrap();

    assert_eq!(update.get("loanAmount"), Some(&json!(3_100_000.0)));
    assert_eq!(update.get("exitStrategy"), Some(&json!("Refinance")));
}

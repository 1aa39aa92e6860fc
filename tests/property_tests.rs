//! Property-based tests using proptest
//! Tests invariants that should hold for all inputs

use chrono::Utc;
use proptest::prelude::*;

use rainmakers_deal_sync::matcher::{find_deal, DEFAULT_MATCH_CHAIN};
use rainmakers_deal_sync::models::Deal;
use rainmakers_deal_sync::reconciler::reconcile;
use rainmakers_deal_sync::stage::normalize_stage;
use rainmakers_deal_sync::webhook_models::OpportunityEvent;

// Property: normalization never panics and is idempotent
proptest! {
    #[test]
    fn normalize_never_panics(label in "\\PC*") {
        let _ = normalize_stage(&label);
    }

    #[test]
    fn normalize_is_idempotent(label in "\\PC*") {
        let once = normalize_stage(&label);
        let twice = normalize_stage(&once);
        prop_assert_eq!(once, twice);
    }
}

// Property: matching never panics for arbitrary identity strings
proptest! {
    #[test]
    fn matcher_never_panics(
        event_id in "\\PC*",
        event_name in "\\PC*",
        stored_id in "\\PC*",
        title in "\\PC*"
    ) {
        let mut deal = Deal::new("d-1".to_string());
        deal.ghl_opportunity_id = Some(stored_id);
        deal.title = Some(title);
        let deals = vec![deal];

        let event = OpportunityEvent {
            id: Some(event_id),
            name: Some(event_name),
            ..OpportunityEvent::default()
        };
        let _ = find_deal(&event, &deals, DEFAULT_MATCH_CHAIN);
    }
}

// Property: reconciling an event twice, with the first result applied in
// between, always yields an empty update set the second time
proptest! {
    #[test]
    fn reconcile_after_apply_is_empty(
        name in "\\PC*",
        status in "\\PC*",
        monetary in 0.0f64..1e12,
        stage in prop::sample::select(vec![
            "Initial Qualification Stage",
            "Needs Analysis Stage",
            "Proposal",
            "signed proposal",
            "Some Unknown Stage",
        ])
    ) {
        let mut deal = Deal::new("d-1".to_string());
        deal.ghl_opportunity_id = Some("ext-1".to_string());

        let event = OpportunityEvent {
            id: Some("ext-1".to_string()),
            name: Some(name),
            status: Some(status),
            monetary_value: Some(monetary),
            ..OpportunityEvent::default()
        };

        let now = Utc::now();
        let first = reconcile(&deal, &event, Some(stage), now).unwrap();
        deal.apply_update(&first).unwrap();

        let second = reconcile(&deal, &event, Some(stage), now).unwrap();
        prop_assert!(second.is_empty(), "second pass produced {:?}", second);
    }
}

// Property: a stage update never appears without its timestamp, and the
// timestamp never appears alone
proptest! {
    #[test]
    fn stage_and_timestamp_are_paired(label in "\\PC*") {
        let mut deal = Deal::new("d-1".to_string());
        deal.stage = Some("Qualification".to_string());

        let event = OpportunityEvent {
            id: Some("ext-1".to_string()),
            ..OpportunityEvent::default()
        };

        let update = reconcile(&deal, &event, Some(&label), Utc::now()).unwrap();
        prop_assert_eq!(update.contains("stage"), update.contains("stageLastUpdated"));
    }
}

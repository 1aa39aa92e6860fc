use crate::models::Deal;
use crate::webhook_models::OpportunityEvent;

/// One tier of the deal-matching fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Exact match on the stored GHL opportunity ID. Authoritative.
    OpportunityId,
    /// Exact match of the opportunity name against `deal_id`,
    /// `property_address`, `property_name`, or `title`.
    ExactName,
    /// Case-insensitive substring match between `title` and the
    /// opportunity name, in either direction.
    TitleSubstring,
}

/// The canonical matching policy: tiers tried in order, first hit wins.
pub const DEFAULT_MATCH_CHAIN: &[MatchStrategy] = &[
    MatchStrategy::OpportunityId,
    MatchStrategy::ExactName,
    MatchStrategy::TitleSubstring,
];

/// Locate the deal an inbound event refers to.
///
/// Each tier is an independent linear scan of all deals. Returns `None`
/// when no tier matches; the caller must not create a deal and must still
/// answer the CRM with success.
pub fn find_deal<'a>(
    event: &OpportunityEvent,
    deals: &'a [Deal],
    chain: &[MatchStrategy],
) -> Option<&'a Deal> {
    for strategy in chain {
        if let Some(deal) = deals.iter().find(|deal| matches(strategy, event, deal)) {
            tracing::debug!(
                deal_id = %deal.id,
                strategy = ?strategy,
                "matched inbound opportunity to deal"
            );
            return Some(deal);
        }
    }
    None
}

fn matches(strategy: &MatchStrategy, event: &OpportunityEvent, deal: &Deal) -> bool {
    match strategy {
        MatchStrategy::OpportunityId => match (&event.id, &deal.ghl_opportunity_id) {
            (Some(event_id), Some(stored_id)) => event_id == stored_id,
            _ => false,
        },
        MatchStrategy::ExactName => {
            let Some(name) = event.name.as_deref() else {
                return false;
            };
            [
                deal.deal_id.as_deref(),
                deal.property_address.as_deref(),
                deal.property_name.as_deref(),
                deal.title.as_deref(),
            ]
            .iter()
            .any(|candidate| *candidate == Some(name))
        }
        MatchStrategy::TitleSubstring => {
            let (Some(name), Some(title)) = (event.name.as_deref(), deal.title.as_deref()) else {
                return false;
            };
            let name = name.trim().to_lowercase();
            let title = title.trim().to_lowercase();
            if name.is_empty() || title.is_empty() {
                return false;
            }
            name.contains(&title) || title.contains(&name)
        }
    }
}

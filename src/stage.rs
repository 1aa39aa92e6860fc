use crate::models::DealStage;

/// Known external stage labels mapped to canonical stages.
///
/// Covers both naming conventions seen in the CRM's history: the
/// "<name> Stage" suffix form and the bare name. Order matters for the
/// substring tiers: longer labels ("Signed Proposal") come before labels
/// they contain ("Proposal").
const STAGE_LABELS: &[(&str, DealStage)] = &[
    // "<name> Stage" convention
    ("Initial Qualification Stage", DealStage::Qualification),
    ("Qualification Stage", DealStage::Qualification),
    ("Needs Analysis Stage", DealStage::NeedsAnalysis),
    ("Lender Submission Stage", DealStage::LenderSubmission),
    ("Signed Proposal Stage", DealStage::SignedProposal),
    ("Proposal Stage", DealStage::Proposal),
    ("Underwriting Stage", DealStage::Underwriting),
    // bare-name convention
    ("Initial Qualification", DealStage::Qualification),
    ("Qualification", DealStage::Qualification),
    ("Needs Analysis", DealStage::NeedsAnalysis),
    ("Lender Submission", DealStage::LenderSubmission),
    ("Signed Proposal", DealStage::SignedProposal),
    ("Proposal", DealStage::Proposal),
    ("Underwriting", DealStage::Underwriting),
];

/// Map an external CRM stage label to a canonical stage label.
///
/// 1. Exact (case-sensitive) lookup in [`STAGE_LABELS`].
/// 2. Case-insensitive substring match: exact equality first, then the
///    label containing a known name, then a known name containing the
///    label. The directions run as separate passes so a short label that
///    is itself a stage name ("proposal") resolves to its own stage
///    instead of the first longer entry that happens to contain it
///    ("Signed Proposal Stage").
/// 3. Pass-through: unknown labels are returned unchanged so they stay
///    visible in the portal instead of being silently dropped.
///
/// Never fails.
pub fn normalize_stage(external_label: &str) -> String {
    if let Some((_, stage)) = STAGE_LABELS
        .iter()
        .find(|(label, _)| *label == external_label)
    {
        return stage.as_str().to_string();
    }

    let needle = external_label.trim().to_lowercase();
    if !needle.is_empty() {
        for (label, stage) in STAGE_LABELS {
            if label.to_lowercase() == needle {
                return stage.as_str().to_string();
            }
        }
        for (label, stage) in STAGE_LABELS {
            if needle.contains(&label.to_lowercase()) {
                return stage.as_str().to_string();
            }
        }
        for (label, stage) in STAGE_LABELS {
            if label.to_lowercase().contains(&needle) {
                return stage.as_str().to_string();
            }
        }
    }

    external_label.to_string()
}

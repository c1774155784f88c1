// Decision engine - turns per-category severities into an accept/reject verdict.
//
// Pure computation, no I/O. The caller's threshold map drives iteration: a
// category left out of the map is never checked, even if the detector scored it.

use super::moderation_models::{
    Action, Category, Decision, DetectionResult, ModerationError, RejectThresholds, Severity,
    VALID_THRESHOLD_VALUES,
};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Reject medium severity and above on every category.
pub fn default_reject_thresholds() -> RejectThresholds {
    Category::ALL.iter().map(|&category| (category, 4)).collect()
}

/// Severity the detector reported for `category`.
pub fn severity_for(category: Category, result: &DetectionResult) -> Result<Severity, ModerationError> {
    let analysis = result.categories_analysis().ok_or_else(|| {
        error!(%category, "Detection result has no categories analysis");
        ModerationError::InvalidArgument(
            "DetectionResult or categoriesAnalysis is null".to_string(),
        )
    })?;

    match analysis.iter().find(|a| a.category == category) {
        Some(found) => found.severity.ok_or_else(|| {
            error!(%category, "Severity is null");
            ModerationError::InvalidArgument(format!(
                "Can not find detection result for {}",
                category
            ))
        }),
        None => {
            let available = analysis
                .iter()
                .map(|a| a.category.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            error!(%category, available = %available, "Category not found in detection result");
            Err(ModerationError::InvalidArgument(format!(
                "Invalid Category {}",
                category
            )))
        }
    }
}

/// Decide what to do with analyzed content.
///
/// # Errors
/// `InvalidArgument` if a threshold is outside {-1, 0, 2, 4, 6} or a category in
/// `reject_thresholds` is missing from `result`. No partial decision is returned.
pub fn make_decision(
    result: &DetectionResult,
    reject_thresholds: &RejectThresholds,
) -> Result<Decision, ModerationError> {
    debug!(
        categories = reject_thresholds.len(),
        "Making moderation decision"
    );

    let mut action_by_category = HashMap::with_capacity(reject_thresholds.len());
    let mut suggested_action = Action::Accept;

    for (&category, &threshold) in reject_thresholds {
        if !VALID_THRESHOLD_VALUES.contains(&threshold) {
            error!(%category, threshold, "Invalid reject threshold");
            return Err(ModerationError::InvalidArgument(
                "RejectThreshold can only be in (-1, 0, 2, 4, 6)".to_string(),
            ));
        }

        let severity = severity_for(category, result)?;
        let action = if threshold != -1 && severity >= threshold {
            Action::Reject
        } else {
            Action::Accept
        };
        action_by_category.insert(category, action);

        if action > suggested_action {
            debug!(%category, "Suggested action raised to Reject");
        }
        suggested_action = suggested_action.max(action);
    }

    if !result.blocklists_match().is_empty() {
        debug!(
            matches = result.blocklists_match().len(),
            "Text blocklist match detected - rejecting content"
        );
        suggested_action = Action::Reject;
    }

    info!(
        "Moderation {}",
        if suggested_action == Action::Accept {
            "ACCEPTED"
        } else {
            "REJECTED"
        }
    );

    Ok(Decision {
        suggested_action,
        action_by_category,
    })
}

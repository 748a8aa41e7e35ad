use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use pagemend_core_types::{PageState, PlannedAction};

use crate::model::{ChangeClassification, ChangeKind};
use crate::signatures;

/// Many new elements after a click is treated as a dialog/overlay burst.
const MANY_NEW_ELEMENTS: usize = 10;
/// Count-delta thresholds for the fallback rule.
const ADDED_REMOVED_LIMIT: usize = 5;
const CHANGED_LIMIT: usize = 10;
/// Cap on signatures carried in the classification record.
const SIGNATURE_SAMPLE_CAP: usize = 12;

/// Classify the change between two snapshots, given the action that was
/// just executed (if any).
///
/// Pure with respect to its inputs: a fixed (before, after, last_action)
/// triple always yields the same kind. Never fails; an internal fault
/// degrades to `Minor` with a continue recommendation.
pub fn classify(
    before: &PageState,
    after: &PageState,
    last_action: Option<&PlannedAction>,
) -> ChangeClassification {
    match catch_unwind(AssertUnwindSafe(|| classify_inner(before, after, last_action))) {
        Ok(classification) => classification,
        Err(_) => {
            warn!("classifier fault, degrading to minor");
            ChangeClassification::new(ChangeKind::Minor, "classification fault, treating as minor")
                .with_recommendation("continue with the current plan")
        }
    }
}

fn classify_inner(
    before: &PageState,
    after: &PageState,
    last_action: Option<&PlannedAction>,
) -> ChangeClassification {
    let new = signatures::new_elements(before, after);
    let removed = signatures::removed_count(before, after);
    let changed = signatures::changed_count(before, after);
    debug!(
        new = new.len(),
        removed,
        changed,
        action = last_action.map(|a| a.kind.label()).unwrap_or("none"),
        "classifying page change"
    );

    // 1. Semantic shortcuts keyed on the action that just ran.
    if let Some(action) = last_action {
        if action.kind.is_text_entry() {
            let dropdownish: Vec<_> = new
                .iter()
                .filter(|sig| signatures::is_dropdown(sig) || signatures::is_option(sig))
                .cloned()
                .collect();
            let combobox_target = action
                .kind
                .target()
                .and_then(|t| t.role.as_deref())
                .map_or(false, |role| role.eq_ignore_ascii_case("combobox"));
            if !dropdownish.is_empty() || (combobox_target && !new.is_empty()) {
                let options = new.iter().filter(|sig| signatures::is_option(sig)).count();
                return ChangeClassification::new(
                    ChangeKind::Interactive,
                    format!("autocomplete appeared after text entry ({options} option(s))"),
                )
                .with_signatures(sample(if dropdownish.is_empty() { new } else { dropdownish }))
                .with_recommendation("select an option or dismiss the suggestion list")
                .with_recommendation("re-observe the page before index-based actions");
            }
        }
        if action.kind.is_click()
            && new.len() > MANY_NEW_ELEMENTS
            && new.iter().any(signatures::is_modal_overlay)
        {
            return blocking_classification(
                format!("dialog burst after click ({} new elements)", new.len()),
                new,
            );
        }
    }

    // 2. Native dialog markers.
    if new.iter().any(signatures::is_native_dialog) {
        return blocking_classification("native dialog appeared".to_string(), new);
    }

    // 3. Modal/overlay structural signatures.
    if new.iter().any(signatures::is_modal_overlay) {
        return blocking_classification("modal overlay appeared".to_string(), new);
    }

    // 4. Dropdown/autocomplete structural signatures.
    if new.iter().any(signatures::is_dropdown) {
        return ChangeClassification::new(ChangeKind::Interactive, "dropdown appeared")
            .with_signatures(sample(new))
            .with_recommendation("select an option or dismiss the suggestion list");
    }

    // 5. Loading/spinner signatures.
    if new.iter().any(signatures::is_spinner) {
        return ChangeClassification::new(ChangeKind::Minor, "loading indicator appeared")
            .with_signatures(sample(new))
            .with_recommendation("wait for the page to settle");
    }

    // 6. Validation-error signatures.
    if new.iter().any(signatures::is_validation_error) {
        return ChangeClassification::new(ChangeKind::Interactive, "validation error surfaced")
            .with_signatures(sample(new))
            .with_recommendation("correct the flagged field before continuing");
    }

    // 7. Navigation beats raw count deltas.
    if before.url != after.url {
        return ChangeClassification::new(
            ChangeKind::Navigation,
            format!("url changed from {} to {}", before.url, after.url),
        )
        .with_signatures(sample(new))
        .with_recommendation("replan against the new page");
    }

    // 8. Count-delta fallback.
    let added = new.len();
    if added > ADDED_REMOVED_LIMIT || removed > ADDED_REMOVED_LIMIT || changed > CHANGED_LIMIT {
        return ChangeClassification::new(
            ChangeKind::Interactive,
            format!("structural drift: +{added}/-{removed} elements, {changed} changed"),
        )
        .with_signatures(sample(new))
        .with_recommendation("re-observe the page before index-based actions");
    }
    if added > 0 || removed > 0 || changed > 0 {
        return ChangeClassification::new(
            ChangeKind::Minor,
            format!("small drift: +{added}/-{removed} elements, {changed} changed"),
        )
        .with_recommendation("continue with the current plan");
    }

    ChangeClassification::none()
}

fn blocking_classification(
    description: String,
    new: Vec<pagemend_core_types::ElementSignature>,
) -> ChangeClassification {
    ChangeClassification::new(ChangeKind::Blocking, description)
        .with_signatures(sample(new))
        .with_recommendation("dismiss or engage the blocking element before continuing")
}

fn sample(mut signatures: Vec<pagemend_core_types::ElementSignature>) -> Vec<pagemend_core_types::ElementSignature> {
    signatures.truncate(SIGNATURE_SAMPLE_CAP);
    signatures
}

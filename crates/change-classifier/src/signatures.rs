//! Structured predicates over normalized element signatures.
//!
//! Each predicate answers one question about a single element; the
//! classifier composes them. Keeping them as plain functions over
//! `ElementSignature` makes every matching rule unit-testable without
//! selector-string edge cases.

use std::collections::HashMap;

use pagemend_core_types::{ElementSignature, PageState};

const MODAL_CLASS_HINTS: &[&str] = &["modal", "overlay", "dialog", "popup", "backdrop", "lightbox"];
const DROPDOWN_CLASS_HINTS: &[&str] = &["autocomplete", "dropdown", "suggestion", "typeahead", "combobox"];
const SPINNER_CLASS_HINTS: &[&str] = &["spinner", "loading", "progress", "skeleton", "shimmer"];
const ERROR_CLASS_HINTS: &[&str] = &["error", "invalid", "warning"];
const CLOSE_CLASS_HINTS: &[&str] = &["close", "dismiss", "cancel"];
const DROPDOWN_ROLES: &[&str] = &["listbox", "combobox", "option", "menu", "menuitem"];

const HIGH_Z_INDEX: i32 = 100;

/// Native alert/confirm/prompt equivalents surfaced into the DOM.
pub fn is_native_dialog(sig: &ElementSignature) -> bool {
    sig.tag == "dialog" || sig.has_role("alertdialog")
}

/// Modal/overlay structural signature: dialog role, high z-index, or a
/// known modal-library class marker on a visible element.
pub fn is_modal_overlay(sig: &ElementSignature) -> bool {
    if !sig.visible {
        return false;
    }
    sig.has_role("dialog")
        || sig.z_index.map_or(false, |z| z >= HIGH_Z_INDEX)
        || MODAL_CLASS_HINTS.iter().any(|hint| sig.class_contains(hint))
}

/// Dropdown/autocomplete structural signature.
pub fn is_dropdown(sig: &ElementSignature) -> bool {
    if !sig.visible {
        return false;
    }
    DROPDOWN_ROLES.iter().any(|role| sig.has_role(role))
        || sig.aria_expanded == Some(true)
        || DROPDOWN_CLASS_HINTS.iter().any(|hint| sig.class_contains(hint))
}

/// A selectable option row inside a dropdown/autocomplete.
pub fn is_option(sig: &ElementSignature) -> bool {
    sig.visible && (sig.has_role("option") || sig.has_role("menuitem"))
}

pub fn is_spinner(sig: &ElementSignature) -> bool {
    sig.has_role("progressbar")
        || SPINNER_CLASS_HINTS.iter().any(|hint| sig.class_contains(hint))
}

pub fn is_validation_error(sig: &ElementSignature) -> bool {
    sig.aria_invalid
        || sig.has_role("alert")
        || ERROR_CLASS_HINTS.iter().any(|hint| sig.class_contains(hint))
}

/// Close-affordance signature used by the dismissal chain.
pub fn is_close_control(sig: &ElementSignature) -> bool {
    if !sig.visible {
        return false;
    }
    let labelled_close = sig
        .aria_label
        .as_deref()
        .map_or(false, |label| label.to_ascii_lowercase().contains("close"));
    let text_close = sig.text.as_deref().map_or(false, |text| {
        let trimmed = text.trim();
        trimmed == "×" || trimmed == "x" || trimmed.eq_ignore_ascii_case("close")
    });
    labelled_close
        || text_close
        || CLOSE_CLASS_HINTS.iter().any(|hint| sig.class_contains(hint))
}

/// Fill-target signature inside a modal (required inputs).
pub fn is_fill_target(sig: &ElementSignature) -> bool {
    sig.visible && sig.interactive && matches!(sig.tag.as_str(), "input" | "textarea" | "select")
}

/// Elements present in `after` but not in `before`, by fingerprint.
pub fn new_elements(before: &PageState, after: &PageState) -> Vec<ElementSignature> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for sig in &before.elements {
        *seen.entry(sig.fingerprint()).or_insert(0) += 1;
    }
    after
        .elements
        .iter()
        .filter(|sig| {
            let key = sig.fingerprint();
            match seen.get_mut(&key) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            }
        })
        .cloned()
        .collect()
}

/// Elements present in `before` but gone from `after`, by fingerprint.
pub fn removed_count(before: &PageState, after: &PageState) -> usize {
    new_elements(after, before).len()
}

/// Elements whose fingerprint survived but whose content changed.
pub fn changed_count(before: &PageState, after: &PageState) -> usize {
    let mut by_fingerprint: HashMap<String, &ElementSignature> = HashMap::new();
    for sig in &before.elements {
        by_fingerprint.entry(sig.fingerprint()).or_insert(sig);
    }
    after
        .elements
        .iter()
        .filter(|sig| {
            by_fingerprint
                .get(&sig.fingerprint())
                .map_or(false, |prev| *prev != *sig)
        })
        .count()
}

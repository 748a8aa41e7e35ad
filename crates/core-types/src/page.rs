use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized structural fingerprint of one page element.
///
/// The engine never inspects raw DOM nodes; the page-state provider boils
/// each element down to this shape so obstruction matching stays free of
/// selector-string parsing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSignature {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,
    #[serde(default)]
    pub aria_expanded: Option<bool>,
    #[serde(default)]
    pub aria_invalid: bool,
    #[serde(default)]
    pub z_index: Option<i32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

fn default_visible() -> bool {
    true
}

impl ElementSignature {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            visible: true,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into().to_ascii_lowercase());
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes
            .into_iter()
            .map(|c| c.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_z_index(mut self, z: i32) -> Self {
        self.z_index = Some(z);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role
            .as_deref()
            .map_or(false, |r| r.eq_ignore_ascii_case(role))
    }

    pub fn class_contains(&self, fragment: &str) -> bool {
        self.classes.iter().any(|c| c.contains(fragment))
    }

    /// Compact stable string used for prefix matching in the pattern store.
    ///
    /// Deliberately excludes text content so near-duplicate obstructions
    /// (same dialog, different copy) share a fingerprint prefix.
    pub fn fingerprint(&self) -> String {
        let mut out = self.tag.clone();
        if let Some(role) = &self.role {
            out.push(':');
            out.push_str(role);
        }
        if let Some(id) = &self.id {
            out.push('#');
            out.push_str(id);
        }
        for class in &self.classes {
            out.push('.');
            out.push_str(class);
        }
        if let Some(z) = self.z_index {
            out.push_str(&format!("@z{z}"));
        }
        out
    }

    /// FNV-1a 64-bit hash of the fingerprint.
    ///
    /// `DefaultHasher` is randomized per process; pattern-store keys must
    /// survive restarts, so the hash is computed explicitly.
    pub fn stable_hash(&self) -> u64 {
        fnv1a(self.fingerprint().as_bytes())
    }
}

pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// One snapshot from the page-state provider.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub elements: Vec<ElementSignature>,
    /// Base64 screenshot, present only when a visual hint was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
}

impl PageState {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            elements: Vec::new(),
            screenshot: None,
        }
    }

    pub fn with_elements(mut self, elements: Vec<ElementSignature>) -> Self {
        self.elements = elements;
        self
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Registrable domain of the current URL, `"unknown"` when unparseable.
    pub fn domain(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.elements
            .iter()
            .any(|sig| sig.fingerprint() == fingerprint)
    }
}

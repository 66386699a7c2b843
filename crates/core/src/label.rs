use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label assigned to a single page: a profile's type id, or unknown when
/// no profile's decision rule held.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PageLabel {
    Known(String),
    Unknown,
}

impl PageLabel {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn is_unknown(&self) -> bool {
        matches!(self, PageLabel::Unknown)
    }

    pub fn as_str(&self) -> &str {
        match self {
            PageLabel::Known(id) => id,
            PageLabel::Unknown => Self::UNKNOWN,
        }
    }
}

impl std::fmt::Display for PageLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for PageLabel {
    fn from(s: String) -> Self {
        if s == PageLabel::UNKNOWN {
            PageLabel::Unknown
        } else {
            PageLabel::Known(s)
        }
    }
}

impl From<PageLabel> for String {
    fn from(label: PageLabel) -> Self {
        label.as_str().to_string()
    }
}

/// One label per page index. Serializes as a plain `{index: label}` map
/// for the downstream field extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationResult {
    pub labels: BTreeMap<usize, PageLabel>,
}

impl ClassificationResult {
    pub fn label_for(&self, index: usize) -> &PageLabel {
        self.labels.get(&index).unwrap_or(&PageLabel::Unknown)
    }

    /// Indices of pages carrying the given type id, in page order.
    pub fn pages_labeled(&self, type_id: &str) -> Vec<usize> {
        self.labels
            .iter()
            .filter(|(_, label)| label.as_str() == type_id)
            .map(|(idx, _)| *idx)
            .collect()
    }
}

impl FromIterator<(usize, PageLabel)> for ClassificationResult {
    fn from_iter<I: IntoIterator<Item = (usize, PageLabel)>>(iter: I) -> Self {
        Self { labels: iter.into_iter().collect() }
    }
}

/// Document-level verdict per type id, over the whole submission's text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceChecklist {
    pub entries: BTreeMap<String, bool>,
}

impl PresenceChecklist {
    pub fn is_present(&self, type_id: &str) -> bool {
        self.entries.get(type_id).copied().unwrap_or(false)
    }

    pub fn missing(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, present)| !**present)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

impl FromIterator<(String, bool)> for PresenceChecklist {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

use std::cmp::Reverse;
use std::sync::Arc;

use tracing::debug;

use docsieve_core::{
    ClassificationResult, DocumentTypeProfile, PageLabel, PresenceChecklist, ProfileSet,
    RecognizedPage,
};

use crate::matcher::{normalize_text, EvidenceMatcher};

/// Assigns document-type labels from weak keyword evidence.
///
/// A type qualifies for a text when at least one strong anchor and at
/// least two keywords overall are present. Page labeling walks the
/// profile table in declared order and takes the first qualifying type;
/// the document-level checklist evaluates every type.
pub struct PageClassifier {
    profiles: Arc<ProfileSet>,
    matcher: EvidenceMatcher,
}

impl PageClassifier {
    pub fn new(profiles: Arc<ProfileSet>) -> Self {
        let matcher = EvidenceMatcher::new(profiles.fuzzy_threshold);
        Self { profiles, matcher }
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    fn qualifies(&self, text: &str, profile: &DocumentTypeProfile) -> bool {
        let strong_hits = self.matcher.count_hits(text, &profile.strong_anchors);
        if strong_hits < 1 {
            return false;
        }
        let total_hits = self.matcher.count_hits(text, &profile.keywords);
        debug!(type_id = %profile.type_id, strong_hits, total_hits, "evidence counts");
        total_hits >= 2
    }

    /// Label for a single page's text. First qualifying profile wins.
    pub fn classify_page(&self, text: &str) -> PageLabel {
        let text = normalize_text(text);
        for profile in self.profiles.iter() {
            if self.qualifies(&text, profile) {
                return PageLabel::Known(profile.type_id.clone());
            }
        }
        PageLabel::Unknown
    }

    /// One label per page, keyed by the pages' own indices.
    pub fn classify_pages(&self, pages: &[RecognizedPage]) -> ClassificationResult {
        pages
            .iter()
            .map(|page| (page.index, self.classify_page(&page.text)))
            .collect()
    }

    /// Document-level rule over one text blob. Every declared type is
    /// evaluated; nothing short-circuits.
    pub fn presence_in_text(&self, text: &str) -> PresenceChecklist {
        let text = normalize_text(text);
        self.profiles
            .iter()
            .map(|profile| (profile.type_id.clone(), self.qualifies(&text, profile)))
            .collect()
    }

    /// Checklist over the concatenated text of all pages.
    pub fn presence_checklist(&self, pages: &[RecognizedPage]) -> PresenceChecklist {
        self.presence_in_text(&assemble_document_text(pages))
    }

    /// Page indices ordered by descending plain-substring keyword count
    /// for one type; ties resolve by ascending page index. Used to pick
    /// the most promising page for downstream field extraction.
    pub fn evidence_rank(&self, type_id: &str, pages: &[RecognizedPage]) -> Vec<usize> {
        let Some(profile) = self.profiles.get(type_id) else {
            return Vec::new();
        };
        let needles: Vec<String> = profile.keywords.iter().map(|k| k.to_lowercase()).collect();
        let mut scored: Vec<(usize, usize)> = pages
            .iter()
            .map(|page| {
                let text = page.text.to_lowercase();
                let hits = needles.iter().filter(|k| text.contains(k.as_str())).count();
                (page.index, hits)
            })
            .collect();
        scored.sort_by_key(|&(index, hits)| (Reverse(hits), index));
        scored.into_iter().map(|(index, _)| index).collect()
    }
}

/// Joins non-empty page texts with single spaces, in page order.
pub fn assemble_document_text(pages: &[RecognizedPage]) -> String {
    let mut ordered: Vec<&RecognizedPage> = pages.iter().collect();
    ordered.sort_by_key(|page| page.index);
    let parts: Vec<&str> = ordered
        .iter()
        .map(|page| page.text.as_str())
        .filter(|text| !text.trim().is_empty())
        .collect();
    parts.join(" ")
}

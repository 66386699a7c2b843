use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::label::PageLabel;

pub const DEFAULT_FUZZY_THRESHOLD: f32 = 70.0;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile table: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse profile table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("profile table declares no document types")]
    NoProfiles,
    #[error("profile with empty type id")]
    EmptyTypeId,
    #[error("type id '{0}' is reserved")]
    ReservedTypeId(String),
    #[error("duplicate type id '{0}'")]
    DuplicateTypeId(String),
    #[error("type '{0}' declares no keywords")]
    NoKeywords(String),
    #[error("type '{0}' declares an empty keyword")]
    EmptyKeyword(String),
}

/// Evidence vocabulary for one document type.
///
/// `keywords` order is insignificant for matching; `strong_anchors` need
/// not be a subset of `keywords`, though in practice they overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTypeProfile {
    pub type_id: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub strong_anchors: Vec<String>,
}

impl DocumentTypeProfile {
    pub fn new<S: Into<String>>(
        type_id: S,
        keywords: &[&str],
        strong_anchors: &[&str],
    ) -> Self {
        Self {
            type_id: type_id.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            strong_anchors: strong_anchors.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// The full, ordered document-type table.
///
/// Declaration order is load-bearing: page classification assigns the
/// first qualifying type. Built once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSet {
    #[serde(default = "default_threshold")]
    pub fuzzy_threshold: f32,
    #[serde(rename = "profile")]
    pub profiles: Vec<DocumentTypeProfile>,
}

fn default_threshold() -> f32 {
    DEFAULT_FUZZY_THRESHOLD
}

impl ProfileSet {
    pub fn new(profiles: Vec<DocumentTypeProfile>) -> Result<Self, ProfileError> {
        let set = Self { fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD, profiles };
        set.validate()?;
        Ok(set)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProfileError> {
        let set: ProfileSet = toml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentTypeProfile> {
        self.profiles.iter()
    }

    pub fn get(&self, type_id: &str) -> Option<&DocumentTypeProfile> {
        self.profiles.iter().find(|p| p.type_id == type_id)
    }

    pub fn type_ids(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.type_id.as_str()).collect()
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.profiles.is_empty() {
            return Err(ProfileError::NoProfiles);
        }
        let mut seen: Vec<&str> = Vec::with_capacity(self.profiles.len());
        for profile in &self.profiles {
            if profile.type_id.trim().is_empty() {
                return Err(ProfileError::EmptyTypeId);
            }
            if profile.type_id == PageLabel::UNKNOWN {
                return Err(ProfileError::ReservedTypeId(profile.type_id.clone()));
            }
            if seen.contains(&profile.type_id.as_str()) {
                return Err(ProfileError::DuplicateTypeId(profile.type_id.clone()));
            }
            seen.push(&profile.type_id);
            if profile.keywords.is_empty() {
                return Err(ProfileError::NoKeywords(profile.type_id.clone()));
            }
            for kw in profile.keywords.iter().chain(&profile.strong_anchors) {
                if kw.trim().is_empty() {
                    return Err(ProfileError::EmptyKeyword(profile.type_id.clone()));
                }
            }
        }
        Ok(())
    }

    /// The production table: manpower reports, GST invoices, salary/bank
    /// transfer proofs, and completion certificates, in that matching
    /// order. `certificate` intentionally carries no strong anchors.
    pub fn builtin() -> Self {
        let profiles = vec![
            DocumentTypeProfile::new(
                "mpr",
                &[
                    "manpower report",
                    "mpr",
                    "monthly progress report",
                    "monthly performance report",
                    "attendance summary",
                    "service period",
                    "from",
                    "to",
                    "satisfactory",
                    "work order no",
                    "project no",
                    "leaves taken",
                ],
                &[
                    "monthly progress report",
                    "monthly performance report",
                    "service period",
                    "from",
                    "to",
                    "satisfactory",
                    "work order no",
                    "project no",
                    "leaves taken",
                ],
            ),
            DocumentTypeProfile::new(
                "invoice",
                &[
                    "tax invoice",
                    "invoice no",
                    "invoice number",
                    "invoice date",
                    "billing address",
                    "ship to",
                    "place of supply",
                    "hsn",
                    "sac",
                    "igst",
                    "cgst",
                    "sgst",
                    "total amount",
                    "amount after tax",
                    "gstin",
                    "reverse charge",
                ],
                &[
                    "tax invoice",
                    "invoice no",
                    "invoice number",
                    "igst",
                    "cgst",
                    "sgst",
                    "hsn",
                    "sac",
                    "place of supply",
                    "gstin",
                ],
            ),
            DocumentTypeProfile::new(
                "salary_proof",
                &[
                    "salary slip",
                    "salary breakup",
                    "net pay",
                    "gross salary",
                    "beneficiary a/c",
                    "beneficiary a/c no",
                    "utr",
                    "neft",
                    "rtgs",
                    "employees' provident fund",
                    "epfo",
                    "trrn",
                    "ecr id",
                    "payment confirmation",
                    "bank statement",
                    "transaction",
                    "debit",
                    "credit",
                    "ifsc",
                    "reference no",
                    "closing balance",
                    "pf breakup",
                ],
                &[
                    "salary breakup",
                    "net pay",
                    "beneficiary a/c",
                    "beneficiary a/c no",
                    "utr",
                    "neft",
                    "rtgs",
                    "employees' provident fund",
                    "epfo",
                    "trrn",
                    "ecr id",
                    "payment confirmation",
                    "bank statement",
                ],
            ),
            DocumentTypeProfile::new(
                "certificate",
                &["completion certificate", "work certificate", "project completion"],
                &[],
            ),
        ];
        Self::new(profiles).expect("built-in profile table is valid")
    }
}

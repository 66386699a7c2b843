use serde::{Deserialize, Serialize};

/// Which preprocessed rendering of a page won recognition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VariantTag {
    /// Baseline adaptive binarization, no geometric correction.
    A,
    /// Orientation-corrected (quadrant rotation undone before binarizing).
    B,
    /// Baseline with a fine-angle deskew applied.
    C,
}

impl std::fmt::Display for VariantTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantTag::A => write!(f, "A"),
            VariantTag::B => write!(f, "B"),
            VariantTag::C => write!(f, "C"),
        }
    }
}

impl std::str::FromStr for VariantTag {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(VariantTag::A),
            "B" => Ok(VariantTag::B),
            "C" => Ok(VariantTag::C),
            other => Err(format!("Unknown variant tag: '{other}'")),
        }
    }
}

/// The recognition outcome for one page.
///
/// `text` is written once by the pipeline run that produced the page and
/// never mutated afterward. An empty `text` with `succeeded == true` means
/// the engine ran and found nothing; `succeeded == false` means every
/// recognition attempt for the page errored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedPage {
    pub index: usize,
    pub text: String,
    pub succeeded: bool,
    pub variant: VariantTag,
    /// Alnum ratio of the winning variant (0.0–1.0).
    pub score: f32,
}

impl RecognizedPage {
    pub fn new(index: usize, text: String, variant: VariantTag, score: f32) -> Self {
        Self { index, text, succeeded: true, variant, score }
    }

    /// Result for a page whose every recognition attempt errored.
    pub fn failed(index: usize) -> Self {
        Self {
            index,
            text: String::new(),
            succeeded: false,
            variant: VariantTag::A,
            score: 0.0,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

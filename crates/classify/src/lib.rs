pub mod classifier;
pub mod matcher;

pub use classifier::{assemble_document_text, PageClassifier};
pub use matcher::{contains_word, normalize_text, similarity, EvidenceMatcher};

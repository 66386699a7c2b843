pub mod label;
pub mod page;
pub mod profile;

pub use label::{ClassificationResult, PageLabel, PresenceChecklist};
pub use page::{RecognizedPage, VariantTag};
pub use profile::{DocumentTypeProfile, ProfileError, ProfileSet, DEFAULT_FUZZY_THRESHOLD};

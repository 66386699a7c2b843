//! Page recognition for scanned documents.
//!
//! The flow per page: normalize the raster into up to three candidate
//! renderings (baseline binarization, orientation-corrected, deskewed),
//! recognize each with an [`engine::OcrEngine`] and keep the text of the
//! best-scoring candidate. [`pipeline::PagePipeline`] runs that flow over
//! all pages of a submission.

pub mod diagnostics;
pub mod engine;
pub mod imageops;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod selector;

pub use diagnostics::{DiagnosticSink, DirectorySink, Stage};
pub use engine::{EngineError, MockEngine, OcrEngine, ScriptedEngine, SystemTesseract};
pub use imageops::{ImageOps, ImageOpsError, RasterOps, Rotation};
pub use normalize::NormalizeError;
pub use pipeline::PagePipeline;
pub use quality::alnum_ratio;
pub use selector::recognize_page;

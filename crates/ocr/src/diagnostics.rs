//! Optional capture of intermediate page images for offline inspection.

use std::fmt;
use std::path::PathBuf;

use image::GrayImage;
use tracing::warn;

/// Pipeline stage a diagnostic image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Baseline,
    OrientationCorrected,
    Deskewed,
    Final,
}

impl Stage {
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Baseline => "baseline",
            Stage::OrientationCorrected => "orientation_corrected",
            Stage::Deskewed => "deskewed",
            Stage::Final => "final",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Receives intermediate binary images. The pipeline never reads anything
/// back, so implementations must absorb their own failures.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, page_index: usize, stage: Stage, image: &GrayImage);
}

/// Writes `page_{index:03}_{stage}.png` files into a single directory.
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates the directory if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, page_index: usize, stage: Stage) -> PathBuf {
        self.dir
            .join(format!("page_{page_index:03}_{}.png", stage.tag()))
    }
}

impl DiagnosticSink for DirectorySink {
    fn record(&self, page_index: usize, stage: Stage, image: &GrayImage) {
        let path = self.path_for(page_index, stage);
        if let Err(err) = image.save(&path) {
            warn!(page = page_index, stage = %stage, error = %err, "failed to write diagnostic image");
        }
    }
}

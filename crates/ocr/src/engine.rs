//! OCR engine boundary and the backends that implement it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use image::{DynamicImage, GrayImage};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::imageops::Rotation;

macro_rules! re {
    ($name:ident, $pattern:literal) => {
        fn $name() -> &'static regex::Regex {
            static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            RE.get_or_init(|| regex::Regex::new($pattern).expect("static regex must compile"))
        }
    };
}

re!(re_osd_rotate, r"(?m)^\s*Rotate:\s*(\d+)");

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("orientation detection unsupported by this backend")]
    OsdUnsupported,
}

/// An OCR engine able to read text off a normalized page and to report the
/// coarse rotation that would bring the original page upright.
pub trait OcrEngine: Send + Sync {
    /// Recognize text on a binarized page image.
    fn recognize(&self, image: &GrayImage) -> Result<String, EngineError>;

    /// Detect the quadrant rotation of the original page.
    fn orientation(&self, image: &DynamicImage) -> Result<Rotation, EngineError>;
}

/// Canned engine for tests: always recognizes the same text and reports an
/// upright page unless told otherwise.
#[derive(Debug, Clone)]
pub struct MockEngine {
    pub text: String,
    pub rotation: Rotation,
}

impl MockEngine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rotation: Rotation::None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

impl OcrEngine for MockEngine {
    fn recognize(&self, _image: &GrayImage) -> Result<String, EngineError> {
        Ok(self.text.clone())
    }

    fn orientation(&self, _image: &DynamicImage) -> Result<Rotation, EngineError> {
        Ok(self.rotation)
    }
}

/// Replays recognition results in call order; calls past the end of the
/// script fail, which makes missing expectations visible in tests.
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<Result<String, EngineError>>>,
    rotation: Option<Rotation>,
}

impl ScriptedEngine {
    /// `rotation: None` makes orientation detection itself fail.
    pub fn new(rotation: Option<Rotation>, responses: Vec<Result<String, EngineError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            rotation,
        }
    }
}

impl OcrEngine for ScriptedEngine {
    fn recognize(&self, _image: &GrayImage) -> Result<String, EngineError> {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::Engine("recognition script exhausted".into())))
    }

    fn orientation(&self, _image: &DynamicImage) -> Result<Rotation, EngineError> {
        self.rotation
            .ok_or_else(|| EngineError::Engine("orientation scripted to fail".into()))
    }
}

/// Engine backed by the system `tesseract` binary.
///
/// Recognition runs page segmentation mode 6 with interword spaces
/// preserved; orientation runs an OSD pass (`--psm 0`) and reads the
/// `Rotate:` line of the report.
pub struct SystemTesseract {
    binary: PathBuf,
    lang: String,
}

impl SystemTesseract {
    pub fn new() -> Self {
        Self::with_binary("tesseract")
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            lang: "eng".to_string(),
        }
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    /// Whether the configured binary answers `--version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn run(&self, input: &Path, args: &[&str]) -> Result<String, EngineError> {
        debug!(binary = %self.binary.display(), ?args, "invoking tesseract");
        let output = Command::new(&self.binary)
            .arg(input)
            .arg("stdout")
            .args(args)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Engine(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for SystemTesseract {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for SystemTesseract {
    fn recognize(&self, image: &GrayImage) -> Result<String, EngineError> {
        let staged = stage(|path| image.save(path))?;
        self.run(
            staged.path(),
            &["-l", &self.lang, "--psm", "6", "-c", "preserve_interword_spaces=1"],
        )
    }

    fn orientation(&self, image: &DynamicImage) -> Result<Rotation, EngineError> {
        let staged = stage(|path| image.save(path))?;
        let report = self.run(staged.path(), &["-l", "osd", "--psm", "0"])?;
        let angle = parse_osd_rotation(&report)
            .ok_or_else(|| EngineError::Engine("OSD report carries no Rotate line".to_string()))?;
        Ok(Rotation::from_degrees(angle))
    }
}

/// Writes an image to a temporary PNG the engine binary can read.
fn stage<F>(write: F) -> Result<NamedTempFile, EngineError>
where
    F: FnOnce(&Path) -> Result<(), image::ImageError>,
{
    let file = tempfile::Builder::new()
        .prefix("docsieve-page-")
        .suffix(".png")
        .tempfile()?;
    write(file.path())?;
    Ok(file)
}

/// Extracts the `Rotate:` angle from a Tesseract OSD report.
fn parse_osd_rotation(report: &str) -> Option<i32> {
    re_osd_rotate()
        .captures(report)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    //! In-process Tesseract via `leptess`.

    use std::io::Cursor;

    use leptess::{LepTess, Variable};

    use super::*;

    /// Engine linked against libtesseract. The bindings expose no OSD entry
    /// point, so orientation reports unsupported and callers treat the page
    /// as upright.
    pub struct TesseractEngine {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractEngine {
        pub fn new(data_path: Option<String>, lang: &str) -> Self {
            Self {
                data_path,
                lang: lang.to_string(),
            }
        }
    }

    impl OcrEngine for TesseractEngine {
        fn recognize(&self, image: &GrayImage) -> Result<String, EngineError> {
            let mut png = Vec::new();
            DynamicImage::ImageLuma8(image.clone())
                .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| EngineError::Engine(e.to_string()))?;
            lt.set_variable(Variable::TesseditPagesegMode, "6")
                .map_err(|e| EngineError::Engine(e.to_string()))?;
            lt.set_variable(Variable::PreserveInterwordSpaces, "1")
                .map_err(|e| EngineError::Engine(e.to_string()))?;
            lt.set_image_from_mem(&png)
                .map_err(|e| EngineError::Engine(e.to_string()))?;
            lt.get_utf8_text()
                .map_err(|e| EngineError::Engine(e.to_string()))
        }

        fn orientation(&self, _image: &DynamicImage) -> Result<Rotation, EngineError> {
            Err(EngineError::OsdUnsupported)
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Luma};

    use super::*;

    fn blank() -> GrayImage {
        ImageBuffer::from_pixel(4, 4, Luma([255u8]))
    }

    #[test]
    fn mock_engine_returns_canned_text() {
        let engine = MockEngine::new("tax invoice");
        assert_eq!(engine.recognize(&blank()).unwrap(), "tax invoice");
        assert_eq!(
            engine.orientation(&DynamicImage::new_luma8(4, 4)).unwrap(),
            Rotation::None
        );
    }

    #[test]
    fn mock_engine_reports_configured_rotation() {
        let engine = MockEngine::new("x").with_rotation(Rotation::Cw180);
        assert_eq!(
            engine.orientation(&DynamicImage::new_luma8(4, 4)).unwrap(),
            Rotation::Cw180
        );
    }

    #[test]
    fn scripted_engine_replays_in_call_order() {
        let engine = ScriptedEngine::new(
            Some(Rotation::None),
            vec![
                Ok("first".into()),
                Err(EngineError::Engine("boom".into())),
                Ok("third".into()),
            ],
        );
        assert_eq!(engine.recognize(&blank()).unwrap(), "first");
        assert!(engine.recognize(&blank()).is_err());
        assert_eq!(engine.recognize(&blank()).unwrap(), "third");
        // Past the end of the script.
        assert!(engine.recognize(&blank()).is_err());
    }

    #[test]
    fn scripted_engine_can_fail_orientation() {
        let engine = ScriptedEngine::new(None, vec![]);
        assert!(engine.orientation(&DynamicImage::new_luma8(4, 4)).is_err());
    }

    #[test]
    fn osd_report_rotation_is_parsed() {
        let report = "Page number: 0\n\
                      Orientation in degrees: 180\n\
                      Rotate: 180\n\
                      Orientation confidence: 6.23\n\
                      Script: Latin\n\
                      Script confidence: 4.57\n";
        assert_eq!(parse_osd_rotation(report), Some(180));
    }

    #[test]
    fn osd_report_without_rotate_line_is_rejected() {
        assert_eq!(parse_osd_rotation("Script: Latin\n"), None);
        assert_eq!(parse_osd_rotation(""), None);
    }

    #[test]
    fn osd_zero_rotation_maps_to_upright() {
        let report = "Page number: 0\nRotate: 0\nScript: Latin\n";
        let angle = parse_osd_rotation(report).unwrap();
        assert_eq!(Rotation::from_degrees(angle), Rotation::None);
    }

    #[test]
    fn missing_binary_surfaces_as_error() {
        let engine = SystemTesseract::with_binary("/nonexistent/tesseract-binary");
        assert!(!engine.is_available());
        assert!(matches!(
            engine.recognize(&blank()),
            Err(EngineError::Io(_))
        ));
    }
}

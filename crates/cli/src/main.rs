//! The `docsieve` binary: recognize a directory of scanned pages and
//! classify each page by document type.
//!
//! Pages are read in lexicographic filename order, recognized through the
//! variant-selecting OCR pipeline and labeled against the document-type
//! profile table. The report (declared type order, per-page label with
//! winning variant and score, plus the document-level presence checklist)
//! goes to stdout as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use docsieve_classify::PageClassifier;
use docsieve_core::{PageLabel, PresenceChecklist, ProfileSet, RecognizedPage, VariantTag};
use docsieve_ocr::{DirectorySink, PagePipeline, SystemTesseract};
use image::DynamicImage;
use serde::Serialize;
use tracing::{info, warn};

const PAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "tif", "tiff", "bmp"];

#[derive(Parser)]
#[command(name = "docsieve")]
#[command(about = "Recognize scanned pages and classify each by document type")]
struct Args {
    /// Directory holding the page images of one submission
    pages: PathBuf,

    /// TOML document-type profile table; the built-in table is used when omitted
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Directory for intermediate page images, one file per page and stage
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Tesseract binary to invoke
    #[arg(long, default_value = "tesseract")]
    tesseract: PathBuf,

    /// Recognition language
    #[arg(long, default_value = "eng")]
    lang: String,
}

#[derive(Debug, Serialize)]
struct PageReport {
    index: usize,
    label: PageLabel,
    variant: VariantTag,
    score: f32,
    succeeded: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    /// Type ids in declaration order, the order labels are matched in.
    types: Vec<String>,
    pages: Vec<PageReport>,
    checklist: PresenceChecklist,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let profiles = match &args.profiles {
        Some(path) => ProfileSet::load(path)
            .with_context(|| format!("loading profile table {}", path.display()))?,
        None => ProfileSet::builtin(),
    };
    let classifier = PageClassifier::new(Arc::new(profiles));

    let engine = SystemTesseract::with_binary(&args.tesseract).with_lang(&args.lang);
    if !engine.is_available() {
        bail!(
            "tesseract binary '{}' not found or not runnable; install it or pass --tesseract",
            args.tesseract.display()
        );
    }

    let mut pipeline = PagePipeline::new(engine);
    if let Some(dir) = &args.diagnostics {
        let sink = DirectorySink::new(dir)
            .with_context(|| format!("creating diagnostics directory {}", dir.display()))?;
        pipeline = pipeline.with_diagnostics(Arc::new(sink));
    }

    let paths = collect_page_paths(&args.pages)?;
    if paths.is_empty() {
        bail!("no page images found in {}", args.pages.display());
    }
    info!(pages = paths.len(), dir = %args.pages.display(), "processing submission");

    let images = load_pages(&paths);
    let results = pipeline.process_pages(images).await;
    let report = build_report(&classifier, &results);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn collect_page_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("reading page directory {}", dir.display()))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Decode failures become zero-sized pages the pipeline reports as failed,
/// so every page keeps its position in the results.
fn load_pages(paths: &[PathBuf]) -> Vec<DynamicImage> {
    paths
        .iter()
        .map(|path| match image::open(path) {
            Ok(img) => img,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not decode page image");
                DynamicImage::new_luma8(0, 0)
            }
        })
        .collect()
}

fn build_report(classifier: &PageClassifier, results: &[RecognizedPage]) -> Report {
    let types = classifier
        .profiles()
        .type_ids()
        .into_iter()
        .map(String::from)
        .collect();
    let labels = classifier.classify_pages(results);
    let checklist = classifier.presence_checklist(results);
    let pages = results
        .iter()
        .map(|page| PageReport {
            index: page.index,
            label: labels.label_for(page.index).clone(),
            variant: page.variant,
            score: page.score,
            succeeded: page.succeeded,
        })
        .collect();
    Report { types, pages, checklist }
}

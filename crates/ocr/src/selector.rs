//! Produces the preprocessing variants of a page, recognizes each and
//! keeps the best-scoring text.

use docsieve_core::{RecognizedPage, VariantTag};
use image::{DynamicImage, GrayImage};
use tracing::{debug, info, warn};

use crate::diagnostics::{DiagnosticSink, Stage};
use crate::engine::OcrEngine;
use crate::imageops::{ImageOps, Rotation};
use crate::normalize;
use crate::quality::alnum_ratio;

/// Runs the full variant flow for one page.
///
/// Variant A is the baseline binarization, variant B the
/// orientation-corrected rendering (produced only when the engine reports a
/// quadrant rotation) and variant C the deskewed baseline. Candidates are
/// compared in the order A, C, B; a later variant must score strictly
/// higher to displace an earlier one. Whatever goes wrong is absorbed
/// here: the worst outcome is an empty, unsuccessful page.
pub fn recognize_page(
    ops: &dyn ImageOps,
    engine: &dyn OcrEngine,
    sink: Option<&dyn DiagnosticSink>,
    index: usize,
    image: &DynamicImage,
) -> RecognizedPage {
    // 1. Baseline binarization; without it there is nothing to recognize.
    let base = match normalize::binarize(ops, image) {
        Ok(binary) => binary,
        Err(err) => {
            warn!(page = index, error = %err, "binarization failed, page gives no text");
            return RecognizedPage::failed(index);
        }
    };
    let (text_a, score_a) = recognize_variant(engine, index, VariantTag::A, &base);

    // 2. Orientation check; detector failures count as an upright page.
    let rotation = match engine.orientation(image) {
        Ok(rotation) => rotation,
        Err(err) => {
            warn!(page = index, error = %err, "orientation detection failed, assuming upright");
            Rotation::None
        }
    };

    // 3. Orientation-corrected variant, only for real corrections.
    let corrected = if rotation.is_correction() {
        info!(page = index, %rotation, "correcting page orientation");
        match normalize::orientation_corrected(ops, image, rotation) {
            Ok(binary) => {
                let scored = recognize_variant(engine, index, VariantTag::B, &binary);
                Some((binary, scored))
            }
            Err(err) => {
                warn!(page = index, error = %err, "orientation-corrected variant failed");
                None
            }
        }
    } else {
        None
    };

    // 4. Deskewed baseline.
    let deskewed = normalize::deskew(ops, &base);
    let (text_c, score_c) = recognize_variant(engine, index, VariantTag::C, &deskewed);

    if let Some(sink) = sink {
        sink.record(index, Stage::Baseline, &base);
        if let Some((binary, _)) = &corrected {
            sink.record(index, Stage::OrientationCorrected, binary);
        }
        sink.record(index, Stage::Deskewed, &deskewed);
    }

    // 5. Selection. Fixed candidate order, ties keep the earlier variant.
    let mut candidates: Vec<(VariantTag, Option<String>, f32, &GrayImage)> = vec![
        (VariantTag::A, text_a, score_a, &base),
        (VariantTag::C, text_c, score_c, &deskewed),
    ];
    if let Some((binary, (text, score))) = &corrected {
        candidates.push((VariantTag::B, text.clone(), *score, binary));
    }

    let succeeded = candidates.iter().any(|(_, text, _, _)| text.is_some());
    let mut winner = &candidates[0];
    for candidate in &candidates[1..] {
        if candidate.2 > winner.2 {
            winner = candidate;
        }
    }
    debug!(page = index, variant = %winner.0, score = winner.2, "variant selected");

    if let Some(sink) = sink {
        sink.record(index, Stage::Final, winner.3);
    }

    let text = winner.1.clone().unwrap_or_default().trim().to_string();
    RecognizedPage {
        index,
        text,
        succeeded,
        variant: winner.0,
        score: winner.2,
    }
}

/// Recognition with the score attached; an engine error becomes a scoreless
/// candidate instead of aborting the page.
fn recognize_variant(
    engine: &dyn OcrEngine,
    index: usize,
    tag: VariantTag,
    image: &GrayImage,
) -> (Option<String>, f32) {
    match engine.recognize(image) {
        Ok(text) => {
            let score = alnum_ratio(&text);
            debug!(page = index, variant = %tag, score, "variant recognized");
            (Some(text), score)
        }
        Err(err) => {
            warn!(page = index, variant = %tag, error = %err, "recognition failed for variant");
            (None, 0.0)
        }
    }
}

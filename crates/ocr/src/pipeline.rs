//! Drives page recognition across a whole submission.

use std::sync::Arc;

use docsieve_core::RecognizedPage;
use image::DynamicImage;
use tracing::error;

use crate::diagnostics::DiagnosticSink;
use crate::engine::OcrEngine;
use crate::imageops::{ImageOps, RasterOps};
use crate::selector;

/// Runs the per-page variant flow over every page of a submission.
///
/// Pages are independent: each one runs on a blocking worker and any kind
/// of failure collapses into an empty, unsuccessful entry at that page's
/// position. Results always come back in page order, one per input.
pub struct PagePipeline<E: OcrEngine + 'static> {
    engine: Arc<E>,
    ops: Arc<dyn ImageOps>,
    sink: Option<Arc<dyn DiagnosticSink>>,
}

impl<E: OcrEngine + 'static> PagePipeline<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            ops: Arc::new(RasterOps),
            sink: None,
        }
    }

    pub fn with_image_ops(mut self, ops: Arc<dyn ImageOps>) -> Self {
        self.ops = ops;
        self
    }

    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Recognize a single page synchronously.
    pub fn process_page(&self, index: usize, image: &DynamicImage) -> RecognizedPage {
        selector::recognize_page(
            self.ops.as_ref(),
            self.engine.as_ref(),
            self.sink.as_deref(),
            index,
            image,
        )
    }

    /// Recognize all pages concurrently, one blocking task per page.
    pub async fn process_pages(&self, pages: Vec<DynamicImage>) -> Vec<RecognizedPage> {
        let mut handles = Vec::with_capacity(pages.len());
        for (index, image) in pages.into_iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let ops = Arc::clone(&self.ops);
            let sink = self.sink.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                selector::recognize_page(ops.as_ref(), engine.as_ref(), sink.as_deref(), index, &image)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(page) => results.push(page),
                Err(err) => {
                    error!(page = index, error = %err, "page worker failed");
                    results.push(RecognizedPage::failed(index));
                }
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use docsieve_core::VariantTag;
    use image::ImageBuffer;

    use super::*;
    use crate::engine::{EngineError, MockEngine};
    use crate::imageops::Rotation;

    fn page_of_width(width: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, 24, image::Luma([200u8])))
    }

    /// Fails recognition for pages of one specific width, succeeds elsewhere.
    struct WidthGate {
        poisoned_width: u32,
    }

    impl OcrEngine for WidthGate {
        fn recognize(&self, image: &image::GrayImage) -> Result<String, EngineError> {
            if image.width() == self.poisoned_width {
                Err(EngineError::Engine("unreadable page".into()))
            } else {
                Ok("readable text".into())
            }
        }

        fn orientation(&self, _image: &DynamicImage) -> Result<Rotation, EngineError> {
            Ok(Rotation::None)
        }
    }

    #[tokio::test]
    async fn results_come_back_in_page_order() {
        let pipeline = PagePipeline::new(MockEngine::new("tax invoice gstin"));
        let pages = vec![page_of_width(20), page_of_width(21), page_of_width(22)];
        let results = pipeline.process_pages(pages).await;

        assert_eq!(results.len(), 3);
        for (i, page) in results.iter().enumerate() {
            assert_eq!(page.index, i);
            assert!(page.succeeded);
            assert_eq!(page.text, "tax invoice gstin");
            assert_eq!(page.variant, VariantTag::A);
        }
    }

    #[tokio::test]
    async fn one_bad_page_does_not_sink_the_rest() {
        let pipeline = PagePipeline::new(WidthGate { poisoned_width: 13 });
        let pages = vec![page_of_width(20), page_of_width(13), page_of_width(22)];
        let results = pipeline.process_pages(pages).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded);
        assert!(!results[1].succeeded);
        assert_eq!(results[1].text, "");
        assert!(results[2].succeeded);
    }

    #[tokio::test]
    async fn empty_submission_yields_no_pages() {
        let pipeline = PagePipeline::new(MockEngine::new("x"));
        let results = pipeline.process_pages(Vec::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn diagnostics_are_written_per_page() {
        let dir = tempfile::tempdir().unwrap();
        let sink = crate::diagnostics::DirectorySink::new(dir.path()).unwrap();
        let pipeline =
            PagePipeline::new(MockEngine::new("text")).with_diagnostics(Arc::new(sink));
        pipeline
            .process_pages(vec![page_of_width(20), page_of_width(21)])
            .await;

        assert!(dir.path().join("page_000_final.png").is_file());
        assert!(dir.path().join("page_001_final.png").is_file());
    }

    #[test]
    fn process_page_matches_async_result() {
        let pipeline = PagePipeline::new(MockEngine::new("same text"));
        let result = pipeline.process_page(5, &page_of_width(20));
        assert_eq!(result.index, 5);
        assert!(result.succeeded);
        assert_eq!(result.text, "same text");
    }
}

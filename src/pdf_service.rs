//! Visual PDF service orchestrating the capture pipeline
//!
//! Runs the linear pipeline
//! `IDLE -> SHOW_OVERLAY -> CAPTURE -> SLICE -> COMPOSE -> SAVE -> HIDE_OVERLAY`
//! against a [`HostPage`]. A failing stage jumps straight to `HIDE_OVERLAY`
//! and then `FAILED`; the overlay is always hidden and the color overrides are
//! always removed before the error reaches the caller.

use crate::{
    pdf_filename, CaptureOptions, CaptureOverrides, CaptureTarget, Config, DefaultLogoLoader,
    DocumentComposer, ElementRasterizer, HostPage, LogoLoader, Metrics, OutputDocument,
    PageGeometry, PageSlicer, PdfError, ProgressOverlay, RasterBitmap, RasterOptions, SlicePlan,
    StylePatcher,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    ShowOverlay,
    Capture,
    Slice,
    Compose,
    Save,
    HideOverlay,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::ShowOverlay => "show overlay",
            PipelineStage::Capture => "capture",
            PipelineStage::Slice => "slice",
            PipelineStage::Compose => "compose",
            PipelineStage::Save => "save",
            PipelineStage::HideOverlay => "hide overlay",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub output_path: PathBuf,
    pub page_count: usize,
    pub logo_count: usize,
    pub file_size: usize,
    pub duration: Duration,
    /// Stages in the order they were entered
    pub stages: Vec<PipelineStage>,
}

/// Generates PDFs from the page loaded in a [`HostPage`]
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use visual_pdf::{BrowserSession, CaptureOverrides, Config, VisualPdfService};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let session = BrowserSession::launch(config.clone()).await?;
///     let host = session.open("https://www.kitesafaris.com/destinations/zanzibar").await?;
///
///     let service = VisualPdfService::new(Arc::new(host), config);
///     let report = service
///         .generate_visual_pdf("destination-guide", &CaptureOverrides::default())
///         .await?;
///     println!("Wrote {} pages to {}", report.page_count, report.output_path.display());
///
///     session.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct VisualPdfService {
    host: Arc<dyn HostPage>,
    config: Config,
    logo_loader: Arc<dyn LogoLoader>,
    overlay: ProgressOverlay,
    metrics: Arc<Metrics>,
}

impl VisualPdfService {
    pub fn new(host: Arc<dyn HostPage>, config: Config) -> Self {
        Self {
            host,
            config,
            logo_loader: Arc::new(DefaultLogoLoader::new()),
            overlay: ProgressOverlay::default(),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_logo_loader(mut self, logo_loader: Arc<dyn LogoLoader>) -> Self {
        self.logo_loader = logo_loader;
        self
    }

    pub fn with_overlay(mut self, overlay: ProgressOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Captures the element with id `target_element_id` into a PDF.
    pub async fn generate_visual_pdf(
        &self,
        target_element_id: &str,
        overrides: &CaptureOverrides,
    ) -> Result<GenerationReport, PdfError> {
        if target_element_id.trim().is_empty() {
            return Err(self.fail(
                PipelineStage::Idle,
                PdfError::ElementNotFound("empty element id".to_string()),
            ));
        }
        self.generate(CaptureTarget::Element(target_element_id.to_string()), overrides)
            .await
    }

    /// Captures the whole document body into a PDF.
    pub async fn generate_full_page_visual_pdf(
        &self,
        overrides: &CaptureOverrides,
    ) -> Result<GenerationReport, PdfError> {
        self.generate(CaptureTarget::WholeDocument, overrides).await
    }

    async fn generate(
        &self,
        target: CaptureTarget,
        overrides: &CaptureOverrides,
    ) -> Result<GenerationReport, PdfError> {
        let start_time = Instant::now();
        let options = overrides
            .resolve(&self.config)
            .map_err(|e| self.fail(PipelineStage::Idle, e))?;

        info!("Generating visual PDF of {} as {}", target, options.filename);
        let mut stages = Vec::with_capacity(7);

        stages.push(PipelineStage::ShowOverlay);
        self.overlay.show(self.host.as_ref()).await;

        let outcome = self.run_stages(&target, &options, &mut stages).await;

        stages.push(PipelineStage::HideOverlay);
        self.overlay.hide(self.host.as_ref()).await;

        match outcome {
            Ok((output_path, document, file_size)) => {
                let duration = start_time.elapsed();
                self.metrics
                    .record_generation(duration, document.page_count());
                info!(
                    "Visual PDF saved to {} ({} pages, {} bytes) in {:?}",
                    output_path.display(),
                    document.page_count(),
                    file_size,
                    duration
                );
                Ok(GenerationReport {
                    output_path,
                    page_count: document.page_count(),
                    logo_count: document.logo_count(),
                    file_size,
                    duration,
                    stages,
                })
            }
            Err((stage, e)) => {
                stages.push(PipelineStage::Failed);
                debug!("Stage trail before failure: {:?}", stages);
                Err(self.fail(stage, e))
            }
        }
    }

    async fn run_stages(
        &self,
        target: &CaptureTarget,
        options: &CaptureOptions,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<(PathBuf, OutputDocument, usize), (PipelineStage, PdfError)> {
        stages.push(PipelineStage::Capture);
        let bitmap = self
            .capture(target, options)
            .await
            .map_err(|e| (PipelineStage::Capture, e))?;

        stages.push(PipelineStage::Slice);
        let geometry =
            PageGeometry::from_options(options).map_err(|e| (PipelineStage::Slice, e))?;
        let (plan, slices) = PageSlicer::new(geometry)
            .slice(bitmap)
            .map_err(|e| (PipelineStage::Slice, e))?;

        stages.push(PipelineStage::Compose);
        let document = self
            .compose(geometry, options, &plan, slices)
            .await
            .map_err(|e| (PipelineStage::Compose, e))?;

        stages.push(PipelineStage::Save);
        let (output_path, file_size) = self
            .save(&document, options)
            .await
            .map_err(|e| (PipelineStage::Save, e))?;

        Ok((output_path, document, file_size))
    }

    /// Locates, patches, rasterizes and unpatches; the patch never outlives this call.
    async fn capture(
        &self,
        target: &CaptureTarget,
        options: &CaptureOptions,
    ) -> Result<RasterBitmap, PdfError> {
        let host = self.host.as_ref();
        let rasterizer = ElementRasterizer::new(RasterOptions {
            scale: options.scale,
            image_load_timeout: self.config.image_load_timeout,
            capture_timeout: self.config.capture_timeout,
            ignore_element_ids: vec![self.overlay.element_id().to_string()],
        });

        let metrics = rasterizer.locate(host, target).await?;

        let patcher = StylePatcher::new(target, self.config.palette.clone());
        let handle = patcher.apply(host).await?;
        let captured = rasterizer.capture(host, target, metrics).await;
        patcher.remove(host, handle).await;

        captured
    }

    async fn compose(
        &self,
        geometry: PageGeometry,
        options: &CaptureOptions,
        plan: &SlicePlan,
        slices: Vec<RasterBitmap>,
    ) -> Result<OutputDocument, PdfError> {
        DocumentComposer::new(
            geometry,
            options.clone(),
            self.config.branding.clone(),
            self.config.logo_timeout,
            self.logo_loader.clone(),
        )
        .with_metrics(self.metrics.clone())
        .compose(plan, slices)
        .await
    }

    async fn save(
        &self,
        document: &OutputDocument,
        options: &CaptureOptions,
    ) -> Result<(PathBuf, usize), PdfError> {
        let bytes = document.to_pdf_bytes()?;

        let output_path = self.config.output_dir.join(pdf_filename(&options.filename));

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| {
                PdfError::SerializationError(format!(
                    "cannot create {}: {e}",
                    self.config.output_dir.display()
                ))
            })?;
        tokio::fs::write(&output_path, &bytes).await.map_err(|e| {
            PdfError::SerializationError(format!("cannot write {}: {e}", output_path.display()))
        })?;

        Ok((output_path, bytes.len()))
    }

    fn fail(&self, stage: PipelineStage, source: PdfError) -> PdfError {
        error!("Visual PDF generation failed during {}: {}", stage, source);
        self.metrics.record_failure(&source);
        PdfError::generation_failed(stage, source)
    }
}

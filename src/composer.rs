//! Page composition: slice, logo and footer for every page
//!
//! Pages are built strictly in slice order. The logo is loaded per page
//! under a fixed time budget; a logo that fails or arrives late only drops
//! the logo from that page.

use crate::{
    CaptureOptions, ComposedPage, ImageRole, LogoPosition, Metrics, OutputDocument, PageElement,
    PageGeometry, PdfError, Placement, RasterBitmap, SlicePlan, TextAlign, TextRole,
};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use dashmap::DashMap;
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Footer text size in points
pub const FOOTER_FONT_SIZE: f64 = 8.0;

/// Distance between the logo and the page edges, in millimetres
pub const LOGO_INSET: f64 = 8.0;

/// Source of logo image bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogoLoader: Send + Sync {
    async fn load(&self, source: &str) -> Result<Vec<u8>, PdfError>;
}

/// Fetches `http(s)` logos over the network and reads anything else from disk
///
/// Successful loads are cached for the lifetime of the loader.
pub struct DefaultLogoLoader {
    client: reqwest::Client,
    cache: DashMap<String, Vec<u8>>,
}

impl DefaultLogoLoader {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            cache: DashMap::new(),
        }
    }

    async fn fetch(&self, source: &str) -> Result<Vec<u8>, PdfError> {
        match url::Url::parse(source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| PdfError::LogoLoadError(format!("{source}: {e}")))?;
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| PdfError::LogoLoadError(format!("{source}: {e}")))?;
                Ok(bytes.to_vec())
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| PdfError::LogoLoadError(format!("bad file url {source}")))?;
                read_logo_file(path).await
            }
            _ => read_logo_file(PathBuf::from(source)).await,
        }
    }
}

async fn read_logo_file(path: PathBuf) -> Result<Vec<u8>, PdfError> {
    tokio::fs::read(&path)
        .await
        .map_err(|e| PdfError::LogoLoadError(format!("{}: {e}", path.display())))
}

impl Default for DefaultLogoLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogoLoader for DefaultLogoLoader {
    async fn load(&self, source: &str) -> Result<Vec<u8>, PdfError> {
        if let Some(cached) = self.cache.get(source) {
            return Ok(cached.value().clone());
        }
        let bytes = self.fetch(source).await?;
        self.cache.insert(source.to_string(), bytes.clone());
        Ok(bytes)
    }
}

pub struct DocumentComposer {
    geometry: PageGeometry,
    options: CaptureOptions,
    branding: String,
    logo_timeout: Duration,
    loader: Arc<dyn LogoLoader>,
    metrics: Arc<Metrics>,
    generated_at: DateTime<Local>,
}

impl DocumentComposer {
    pub fn new(
        geometry: PageGeometry,
        options: CaptureOptions,
        branding: impl Into<String>,
        logo_timeout: Duration,
        loader: Arc<dyn LogoLoader>,
    ) -> Self {
        Self {
            geometry,
            options,
            branding: branding.into(),
            logo_timeout,
            loader,
            metrics: Arc::new(Metrics::new()),
            generated_at: Local::now(),
        }
    }

    /// Reports skipped logos through a shared set of metric handles.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Pins the timestamp printed on the first page.
    pub fn with_generated_at(mut self, generated_at: DateTime<Local>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Builds the document from slices produced by `plan`, in order.
    pub async fn compose(
        &self,
        plan: &SlicePlan,
        slices: Vec<RasterBitmap>,
    ) -> Result<OutputDocument, PdfError> {
        if slices.is_empty() {
            return Err(PdfError::SerializationError(
                "nothing to compose: no page slices".to_string(),
            ));
        }

        let mut document = OutputDocument::new(
            self.options.filename.trim_end_matches(".pdf"),
            self.geometry.page_width,
            self.geometry.page_height,
            self.options.quality,
        );
        let total_pages = slices.len();
        let mut skipped_logos = 0;

        for (index, slice) in slices.into_iter().enumerate() {
            let mut page = ComposedPage::default();
            page.elements
                .push(self.slice_element(slice, plan.pixels_per_mm));

            if self.options.include_logo {
                match self.load_logo().await {
                    Ok(logo) => page.elements.push(self.logo_element(logo)),
                    Err(e) => {
                        skipped_logos += 1;
                        warn!("Skipping logo on page {}: {}", index + 1, e);
                    }
                }
            }

            page.elements.extend(self.footer_elements(index, total_pages));
            document.push_page(page);
            debug!("Composed page {} of {}", index + 1, total_pages);
        }

        self.metrics.record_logos_skipped(skipped_logos);
        info!(
            "Composed {} pages ({} with logo)",
            document.page_count(),
            document.logo_count()
        );
        Ok(document)
    }

    fn slice_element(&self, slice: RasterBitmap, pixels_per_mm: f64) -> PageElement {
        let height = (slice.height() as f64 / pixels_per_mm).min(self.geometry.content_height);
        PageElement::Image {
            role: ImageRole::Slice,
            bitmap: Arc::new(slice),
            placement: Placement {
                x: self.geometry.margin_left,
                y: self.geometry.margin_top,
                width: self.geometry.content_width,
                height,
            },
        }
    }

    async fn load_logo(&self) -> Result<RgbaImage, PdfError> {
        let bytes = timeout(self.logo_timeout, self.loader.load(&self.options.logo_path))
            .await
            .map_err(|_| {
                PdfError::LogoLoadError(format!(
                    "{} did not load within {:?}",
                    self.options.logo_path, self.logo_timeout
                ))
            })??;

        let logo = image::load_from_memory(&bytes)
            .map_err(|e| PdfError::LogoLoadError(format!("undecodable logo: {e}")))?
            .to_rgba8();

        if logo.width() == 0 || logo.height() == 0 {
            return Err(PdfError::LogoLoadError("logo has no pixels".to_string()));
        }
        Ok(logo)
    }

    /// Corner placement at the nominal width, keeping the logo's aspect ratio.
    pub fn logo_placement(&self, logo_width: u32, logo_height: u32) -> Placement {
        let width = self.options.logo_size;
        let height = width * logo_height as f64 / logo_width as f64;
        let right = self.geometry.page_width - LOGO_INSET - width;
        let bottom = self.geometry.page_height - LOGO_INSET - height;

        let (x, y) = match self.options.logo_position {
            LogoPosition::TopLeft => (LOGO_INSET, LOGO_INSET),
            LogoPosition::TopRight => (right, LOGO_INSET),
            LogoPosition::BottomLeft => (LOGO_INSET, bottom),
            LogoPosition::BottomRight => (right, bottom),
        };

        Placement {
            x,
            y,
            width,
            height,
        }
    }

    fn logo_element(&self, logo: RgbaImage) -> PageElement {
        let placement = self.logo_placement(logo.width(), logo.height());
        PageElement::Image {
            role: ImageRole::Logo,
            bitmap: Arc::new(logo),
            placement,
        }
    }

    fn footer_elements(&self, index: usize, total_pages: usize) -> Vec<PageElement> {
        let geometry = &self.geometry;
        let baseline = geometry.page_height - geometry.margin_bottom / 2.0;
        let mut elements = Vec::with_capacity(3);

        if self.options.show_page_numbers {
            elements.push(PageElement::Text {
                role: TextRole::PageNumber,
                text: format!("Page {} of {}", index + 1, total_pages),
                x: geometry.page_width / 2.0,
                y: baseline,
                font_size: FOOTER_FONT_SIZE,
                align: TextAlign::Center,
            });
        }

        if self.options.show_timestamp && index == 0 {
            elements.push(PageElement::Text {
                role: TextRole::Timestamp,
                text: format!(
                    "Generated: {}",
                    self.generated_at.format("%Y-%m-%d %H:%M")
                ),
                x: geometry.margin_left,
                y: baseline,
                font_size: FOOTER_FONT_SIZE,
                align: TextAlign::Left,
            });
        }

        elements.push(PageElement::Text {
            role: TextRole::Branding,
            text: self.branding.clone(),
            x: geometry.page_width - geometry.margin_right,
            y: baseline,
            font_size: FOOTER_FONT_SIZE,
            align: TextAlign::Right,
        });

        elements
    }
}

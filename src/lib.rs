//! # Visual PDF
//!
//! Exports a rendered section of a live web page to a paginated, branded PDF.
//! The target element (or the whole document body) is rasterized by headless
//! Chrome, cut into page-height slices and laid out on A4/A3/Letter/Legal
//! pages with an optional logo, page numbers, a generation timestamp and a
//! branding footer.
//!
//! ## Pipeline
//!
//! ```text
//! IDLE -> SHOW_OVERLAY -> CAPTURE -> SLICE -> COMPOSE -> SAVE -> HIDE_OVERLAY
//!                            \________\_________\________\--> HIDE_OVERLAY -> FAILED
//! ```
//!
//! | Stage | Work | Failure |
//! |-------|------|---------|
//! | **Show overlay** | Blocking progress indicator in the page | Logged, run continues |
//! | **Capture** | Locate target, inject color fallbacks, rasterize, remove fallbacks | `ElementNotFound` / `CaptureError` |
//! | **Slice** | Fit to content width, cut into page-height bitmaps | `CaptureError` |
//! | **Compose** | Slice, logo and footers per page | Logo failures skip the logo only |
//! | **Save** | Serialize and write `<output_dir>/<filename>` | `SerializationError` |
//! | **Hide overlay** | Always runs | Logged |
//!
//! Every fatal error is returned as [`PdfError::GenerationFailed`] naming the
//! stage it happened in. By the time it is returned the overlay is gone and the
//! page's styles are back to their original state.
//!
//! ### Color fallbacks
//!
//! Pages styled with modern color functions (`oklch`, `lab`, ...) do not
//! always rasterize faithfully. While a capture runs, a stylesheet scoped to the
//! target maps the site's palette classes to literal hex colors. It is removed
//! as soon as the bitmap is taken, whether or not the capture succeeded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use visual_pdf::{BrowserSession, CaptureOverrides, Config, PageFormat, VisualPdfService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let session = BrowserSession::launch(config.clone()).await?;
//!     let host = session.open("https://www.kitesafaris.com/trips/kenya").await?;
//!
//!     let service = VisualPdfService::new(Arc::new(host), config);
//!     let overrides = CaptureOverrides {
//!         filename: Some("kenya-trip.pdf".to_string()),
//!         format: Some(PageFormat::Letter),
//!         ..Default::default()
//!     };
//!     let report = service.generate_visual_pdf("trip-details", &overrides).await?;
//!     println!("{} pages written to {}", report.page_count, report.output_path.display());
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ### Single element
//! ```bash
//! visual-pdf element --url https://www.kitesafaris.com/trips/kenya --target trip-details
//! ```
//!
//! ### Whole page, landscape, no logo
//! ```bash
//! visual-pdf full-page --url https://www.kitesafaris.com --orientation landscape --no-logo
//! ```
//!
//! ## Performance Benchmarks
//!
//! ```bash
//! # Slicing and composition (no Chrome required)
//! cargo bench
//!
//! # Including a real Chrome capture
//! cargo bench --features integration_benchmarks
//! ```

/// Configuration and capture options
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// The live document seen through Chrome DevTools
pub mod host;

/// Headless Chrome session lifecycle
pub mod browser;

/// Temporary color fallback stylesheet
pub mod style_patch;

/// Element location and rasterization
pub mod rasterizer;

/// Page geometry and bitmap slicing
pub mod slicer;

/// In-memory document model and PDF serialization
pub mod document;

/// Page assembly with logo and footers
pub mod composer;

/// Progress overlay shown during generation
pub mod overlay;

/// Pipeline orchestration
pub mod pdf_service;

/// Command-line interface implementation
pub mod cli;

/// Pipeline metrics
pub mod metrics;

/// Utility functions and helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use browser::*;
pub use cli::*;
pub use composer::*;
pub use config::*;
pub use document::*;
pub use error::*;
pub use host::*;
pub use self::metrics::*;
pub use overlay::*;
pub use pdf_service::*;
pub use rasterizer::*;
pub use slicer::*;
pub use style_patch::*;
pub use utils::*;

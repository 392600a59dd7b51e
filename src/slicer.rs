//! Page geometry and bitmap pagination
//!
//! A tall capture is fitted to the page's content width and cut into
//! content-height slices. The cut points are computed in source pixels so the
//! crop rectangles line up exactly with the bitmap.

use crate::{CaptureOptions, Orientation, PdfError, RasterBitmap};
use image::imageops;
use tracing::debug;

/// Slack for floating-point error when deciding whether another page is needed.
const SUBPIXEL_TOLERANCE: f64 = 0.5;

/// Physical page and content-area size, in millimetres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width: f64,
    pub page_height: f64,
    pub content_width: f64,
    pub content_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl PageGeometry {
    pub fn from_options(options: &CaptureOptions) -> Result<Self, PdfError> {
        let (width, height) = options.format.dimensions_mm();
        let (page_width, page_height) = match options.orientation {
            Orientation::Portrait => (width, height),
            Orientation::Landscape => (height, width),
        };

        let m = options.margin;
        let content_width = page_width - m.left - m.right;
        let content_height = page_height - m.top - m.bottom;

        if content_width <= 0.0 || content_height <= 0.0 {
            return Err(PdfError::ConfigurationError(format!(
                "margins leave no content area on a {page_width}x{page_height}mm page"
            )));
        }

        Ok(Self {
            page_width,
            page_height,
            content_width,
            content_height,
            margin_top: m.top,
            margin_right: m.right,
            margin_bottom: m.bottom,
            margin_left: m.left,
        })
    }
}

/// Source rectangle of one page, in bitmap pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRect {
    pub source_y: u32,
    pub source_height: u32,
}

/// Slices for a bitmap of the given size
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePlan {
    pub slices: Vec<SliceRect>,
    /// Source pixels per millimetre once the bitmap is fitted to content width
    pub pixels_per_mm: f64,
    /// Height of the width-fitted image in millimetres
    pub scaled_image_height: f64,
}

impl SlicePlan {
    pub fn total_pages(&self) -> usize {
        self.slices.len()
    }
}

pub struct PageSlicer {
    geometry: PageGeometry,
}

impl PageSlicer {
    pub fn new(geometry: PageGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Computes the slice boundaries for a `width × height` bitmap.
    pub fn plan(&self, width: u32, height: u32) -> Result<SlicePlan, PdfError> {
        if width == 0 || height == 0 {
            return Err(PdfError::CaptureError(format!(
                "cannot paginate an empty {width}x{height} bitmap"
            )));
        }

        let pixels_per_mm = width as f64 / self.geometry.content_width;
        let scaled_image_height = self.geometry.content_width * (height as f64 / width as f64);
        let page_pixels = self.geometry.content_height * pixels_per_mm;
        let image_pixels = height as f64;

        let mut offsets = vec![0.0];
        let mut position = 0.0;
        while position + page_pixels < image_pixels - SUBPIXEL_TOLERANCE {
            position += page_pixels;
            offsets.push(position);
        }

        let slices = offsets
            .iter()
            .map(|offset| {
                let source_y = (offset.round() as u32).min(height - 1);
                let end = ((offset + page_pixels).round() as u32).min(height);
                SliceRect {
                    source_y,
                    source_height: end.saturating_sub(source_y).max(1),
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Planned {} pages for {}x{} bitmap ({:.1}mm tall, {:.1}px per page)",
            slices.len(),
            width,
            height,
            scaled_image_height,
            page_pixels
        );

        Ok(SlicePlan {
            slices,
            pixels_per_mm,
            scaled_image_height,
        })
    }

    /// Cuts the bitmap into one owned bitmap per page.
    pub fn slice(&self, bitmap: RasterBitmap) -> Result<(SlicePlan, Vec<RasterBitmap>), PdfError> {
        let plan = self.plan(bitmap.width(), bitmap.height())?;

        if plan.total_pages() == 1 {
            return Ok((plan, vec![bitmap]));
        }

        let pages = plan
            .slices
            .iter()
            .map(|rect| {
                imageops::crop_imm(
                    &bitmap,
                    0,
                    rect.source_y,
                    bitmap.width(),
                    rect.source_height,
                )
                .to_image()
            })
            .collect();

        Ok((plan, pages))
    }
}

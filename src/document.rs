//! In-memory output document and PDF serialization
//!
//! Pages are built as plain data (images and texts placed in millimetres from
//! the top-left corner) and only turned into PDF once, at the end of a run.

use crate::PdfError;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbaImage};
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject,
    Mm, PdfDocument, Px, Rgb,
};
use std::sync::Arc;
use tracing::debug;

/// DPI images are declared at; placement scales them to their target box.
const IMAGE_DPI: f64 = 300.0;

/// Average Helvetica glyph advance as a fraction of the font size.
const HELVETICA_AVG_ADVANCE: f64 = 0.5;

const PT_TO_MM: f64 = 25.4 / 72.0;

/// Placement box in millimetres, origin at the page's top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    Slice,
    Logo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    PageNumber,
    Timestamp,
    Branding,
}

#[derive(Debug, Clone)]
pub enum PageElement {
    Image {
        role: ImageRole,
        bitmap: Arc<RgbaImage>,
        placement: Placement,
    },
    Text {
        role: TextRole,
        text: String,
        /// Anchor x in millimetres; meaning depends on `align`
        x: f64,
        /// Baseline, millimetres from the top edge
        y: f64,
        font_size: f64,
        align: TextAlign,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ComposedPage {
    pub elements: Vec<PageElement>,
}

impl ComposedPage {
    pub fn image_count(&self, role: ImageRole) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, PageElement::Image { role: r, .. } if *r == role))
            .count()
    }

    pub fn text(&self, role: TextRole) -> Option<&str> {
        self.elements.iter().find_map(|e| match e {
            PageElement::Text { role: r, text, .. } if *r == role => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            PageElement::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// The multi-page document being assembled
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub title: String,
    pub page_width: f64,
    pub page_height: f64,
    /// JPEG fidelity used when images are serialized, 0.0 to 1.0
    pub quality: f64,
    pages: Vec<ComposedPage>,
}

impl OutputDocument {
    pub fn new(title: impl Into<String>, page_width: f64, page_height: f64, quality: f64) -> Self {
        Self {
            title: title.into(),
            page_width,
            page_height,
            quality,
            pages: Vec::new(),
        }
    }

    /// Appends a page; pages keep their insertion order.
    pub fn push_page(&mut self, page: ComposedPage) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[ComposedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn logo_count(&self) -> usize {
        self.pages.iter().map(|p| p.image_count(ImageRole::Logo)).sum()
    }

    /// Serializes the document to PDF bytes.
    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>, PdfError> {
        if self.pages.is_empty() {
            return Err(PdfError::SerializationError(
                "document has no pages".to_string(),
            ));
        }

        let doc = PdfDocument::empty(self.title.as_str());
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PdfError::SerializationError(format!("font error: {e:?}")))?;
        let jpeg_quality = jpeg_quality(self.quality);

        for (index, page) in self.pages.iter().enumerate() {
            let (page_index, layer_index) = doc.add_page(
                Mm(self.page_width as f32),
                Mm(self.page_height as f32),
                format!("Page {}", index + 1),
            );
            let layer = doc.get_page(page_index).get_layer(layer_index);

            for element in &page.elements {
                match element {
                    PageElement::Image {
                        bitmap, placement, ..
                    } => {
                        let image = Image::from(jpeg_xobject(bitmap, jpeg_quality)?);
                        let native_width = bitmap.width() as f64 * 25.4 / IMAGE_DPI;
                        let native_height = bitmap.height() as f64 * 25.4 / IMAGE_DPI;
                        image.add_to_layer(
                            layer.clone(),
                            ImageTransform {
                                translate_x: Some(Mm(placement.x as f32)),
                                translate_y: Some(Mm(
                                    (self.page_height - placement.y - placement.height) as f32,
                                )),
                                scale_x: Some((placement.width / native_width) as f32),
                                scale_y: Some((placement.height / native_height) as f32),
                                dpi: Some(IMAGE_DPI as f32),
                                ..Default::default()
                            },
                        );
                    }
                    PageElement::Text {
                        text,
                        x,
                        y,
                        font_size,
                        align,
                        ..
                    } => {
                        let width = estimate_text_width(text, *font_size);
                        let left = match align {
                            TextAlign::Left => *x,
                            TextAlign::Center => x - width / 2.0,
                            TextAlign::Right => x - width,
                        };
                        layer.set_fill_color(Color::Rgb(Rgb::new(0.4, 0.4, 0.4, None)));
                        layer.use_text(
                            text.as_str(),
                            *font_size as f32,
                            Mm(left as f32),
                            Mm((self.page_height - y) as f32),
                            &font,
                        );
                    }
                }
            }
        }

        let bytes = doc
            .save_to_bytes()
            .map_err(|e| PdfError::SerializationError(format!("{e:?}")))?;
        debug!("Serialized {} pages into {} bytes", self.pages.len(), bytes.len());
        Ok(bytes)
    }
}

/// Approximate rendered width of Helvetica text, in millimetres.
pub fn estimate_text_width(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * HELVETICA_AVG_ADVANCE * PT_TO_MM
}

fn jpeg_quality(quality: f64) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Flattens alpha onto white; PDF image XObjects here carry no soft mask.
fn flatten_rgb(bitmap: &RgbaImage) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize * 3);
    for pixel in bitmap.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        for channel in [r, g, b] {
            rgb.push(((channel as u32 * alpha + 255 * (255 - alpha)) / 255) as u8);
        }
    }
    rgb
}

fn jpeg_xobject(bitmap: &RgbaImage, quality: u8) -> Result<ImageXObject, PdfError> {
    let rgb = flatten_rgb(bitmap);
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&rgb, bitmap.width(), bitmap.height(), ColorType::Rgb8)
        .map_err(|e| PdfError::SerializationError(format!("jpeg encoding failed: {e}")))?;

    Ok(ImageXObject {
        width: Px(bitmap.width() as usize),
        height: Px(bitmap.height() as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: jpeg,
        image_filter: Some(ImageFilter::DCT),
        clipping_bbox: None,
        smask: None,
    })
}

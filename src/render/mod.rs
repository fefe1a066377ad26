//! # Certificate Renderer
//!
//! Stamps a resolved field layout onto a template, producing one artifact
//! per recipient.
//!
//! ## Architecture
//!
//! ```text
//! Template (image or PDF) ─┐
//! Field layout ────────────┼─→ render() ─→ artifact bytes (PNG or PDF)
//! Recipient data + cert ID ┘
//! ```
//!
//! Two variants share the same placement algorithm but differ in coordinate
//! system and color model:
//!
//! - [`raster`]: pixel canvas sized exactly to the template, top-left origin,
//!   text anchored center/middle on the anchor point.
//! - [`document`]: PDF points, bottom-left origin (percent coordinates stay
//!   top-down to match the editor, so Y is inverted here), text anchored
//!   left/baseline with alignment implemented by shifting the X origin.
//!
//! The percentage→absolute conversion lives in [`anchor_px`] exactly once;
//! both variants go through it. Rendering never mutates the template or the
//! field list, and the same inputs always produce byte-identical output.

mod document;
mod glyph;
mod metrics;
mod raster;

pub use glyph::{char_box, glyph_bitmap};
pub use metrics::helvetica_bold_width;

use std::collections::HashMap;

use image::DynamicImage;

use crate::error::CertiflowError;
use crate::field::Field;
use crate::project::TemplateKind;

/// A decoded template ready for per-recipient rendering.
///
/// Decoding happens once per campaign run, not once per recipient.
pub enum Template {
    /// Raster template held as a decoded image.
    Raster(DynamicImage),
    /// PDF template held as the original bytes; each render re-opens the
    /// document so the template itself is never mutated.
    Pdf(Vec<u8>),
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Template::Raster(img) => f
                .debug_struct("Template::Raster")
                .field("width", &img.width())
                .field("height", &img.height())
                .finish(),
            Template::Pdf(bytes) => f
                .debug_struct("Template::Pdf")
                .field("bytes", &bytes.len())
                .finish(),
        }
    }
}

impl Template {
    /// Decode template bytes, failing with a template-load error (fatal to a
    /// campaign batch) if the asset cannot be decoded.
    pub fn load(kind: TemplateKind, bytes: &[u8]) -> Result<Template, CertiflowError> {
        match kind {
            TemplateKind::Image => {
                let img = image::load_from_memory(bytes).map_err(|e| {
                    CertiflowError::TemplateLoad(format!("cannot decode image template: {e}"))
                })?;
                Ok(Template::Raster(img))
            }
            TemplateKind::Pdf => {
                // Validate up front so a bad template fails the batch before
                // the first recipient, not during it.
                document::validate(bytes)?;
                Ok(Template::Pdf(bytes.to_vec()))
            }
        }
    }

    /// File extension of the artifacts this template produces.
    pub fn artifact_extension(&self) -> &'static str {
        match self {
            Template::Raster(_) => "png",
            Template::Pdf(_) => "pdf",
        }
    }
}

/// Convert a field's percentage position to absolute top-down coordinates.
///
/// This is the single home of the percentage→absolute conversion; the
/// document variant inverts Y afterwards because PDF space grows upward.
pub fn anchor_px(x_percent: f32, y_percent: f32, width: f32, height: f32) -> (f32, f32) {
    (x_percent / 100.0 * width, y_percent / 100.0 * height)
}

/// Render one recipient's certificate.
///
/// Fields are drawn in list order. Text values go through the placeholder
/// resolver; QR fields never do (they carry no text value).
pub fn render(
    template: &Template,
    fields: &[Field],
    data: &HashMap<String, String>,
    cert_id: &str,
) -> Result<Vec<u8>, CertiflowError> {
    match template {
        Template::Raster(img) => raster::render(img, fields, data, cert_id),
        Template::Pdf(bytes) => document::render(bytes, fields, data, cert_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_conversion() {
        assert_eq!(anchor_px(50.0, 50.0, 600.0, 400.0), (300.0, 200.0));
        assert_eq!(anchor_px(0.0, 100.0, 600.0, 400.0), (0.0, 400.0));
        assert_eq!(anchor_px(25.0, 75.0, 800.0, 400.0), (200.0, 300.0));
    }

    #[test]
    fn garbage_image_template_fails_to_load() {
        let err = Template::load(TemplateKind::Image, b"not an image").unwrap_err();
        assert!(matches!(err, CertiflowError::TemplateLoad(_)));
        assert!(err.is_batch_fatal());
    }

    #[test]
    fn garbage_pdf_template_fails_to_load() {
        let err = Template::load(TemplateKind::Pdf, b"%PDF-nope").unwrap_err();
        assert!(matches!(err, CertiflowError::TemplateLoad(_)));
    }
}

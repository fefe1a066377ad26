//! Raster rendering variant.
//!
//! The canvas is sized exactly to the template's native pixel dimensions —
//! no rescaling, so output stays WYSIWYG with the editor preview, which uses
//! the same percentage coordinate system. Text is anchored horizontally per
//! the field alignment and vertically centered on the anchor point, so
//! font-size edits don't drift the anchor.

use std::collections::HashMap;
use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::error::CertiflowError;
use crate::field::{Color, Field, FieldKind, TextAlign};
use crate::render::{anchor_px, char_box, glyph_bitmap};
use crate::resolve::resolve;

/// QR placeholder glyphs are drawn `font_size * 3` pixels square so they
/// visually match nearby text scale.
const QR_SCALE: f32 = 3.0;

pub(super) fn render(
    template: &DynamicImage,
    fields: &[Field],
    data: &HashMap<String, String>,
    cert_id: &str,
) -> Result<Vec<u8>, CertiflowError> {
    let mut canvas = template.to_rgba8();
    let (width, height) = (canvas.width() as f32, canvas.height() as f32);

    for field in fields {
        let (ax, ay) = anchor_px(field.x_percent, field.y_percent, width, height);

        match field.kind {
            FieldKind::QrCode => {
                draw_qr_placeholder(&mut canvas, ax, ay, field.font_size * QR_SCALE);
            }
            FieldKind::Text => {
                let text = resolve(&field.key, data, cert_id);
                let color = Color::from_hex(&field.font_color)?;
                draw_text(
                    &mut canvas,
                    &text,
                    ax,
                    ay,
                    field.font_size,
                    color,
                    field.text_align,
                );
            }
        }
    }

    encode_png(canvas)
}

/// Stamp text with the anchor at `(ax, ay)`: horizontal placement per the
/// alignment, vertical middle on the anchor.
fn draw_text(
    canvas: &mut RgbaImage,
    text: &str,
    ax: f32,
    ay: f32,
    font_size: f32,
    color: Color,
    align: TextAlign,
) {
    let (char_w, char_h) = char_box(font_size);
    let text_width = (char_w * text.chars().count()) as f32;

    let x0 = match align {
        TextAlign::Left => ax,
        TextAlign::Center => ax - text_width / 2.0,
        TextAlign::Right => ax - text_width,
    };
    let y0 = ay - char_h as f32 / 2.0;

    let ink = Rgba([color.r, color.g, color.b, 255]);

    for (i, ch) in text.chars().enumerate() {
        let glyph = glyph_bitmap(ch, char_w, char_h);
        let gx0 = x0 + (i * char_w) as f32;

        for gy in 0..char_h {
            for gx in 0..char_w {
                if glyph[gy * char_w + gx] == 1 {
                    put_pixel(canvas, gx0 + gx as f32, y0 + gy as f32, ink);
                }
            }
        }
    }
}

/// Draw the non-functional QR placeholder: a black square centered on the
/// anchor with a 3×3 pattern of white inner squares.
fn draw_qr_placeholder(canvas: &mut RgbaImage, ax: f32, ay: f32, size: f32) {
    let black = Rgba([0, 0, 0, 255]);
    let white = Rgba([255, 255, 255, 255]);

    fill_rect(canvas, ax - size / 2.0, ay - size / 2.0, size, size, black);

    let cell = size / 5.0;
    for i in 0..3 {
        for j in 0..3 {
            if (i + j) % 2 == 0 {
                let x = ax - size / 2.0 + i as f32 * size / 4.0 + 5.0;
                let y = ay - size / 2.0 + j as f32 * size / 4.0 + 5.0;
                fill_rect(canvas, x, y, cell, cell, white);
            }
        }
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
    for dy in 0..h.max(0.0) as u32 {
        for dx in 0..w.max(0.0) as u32 {
            put_pixel(canvas, x + dx as f32, y + dy as f32, color);
        }
    }
}

/// Plot one pixel, clipping anything outside the canvas.
fn put_pixel(canvas: &mut RgbaImage, x: f32, y: f32, color: Rgba<u8>) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (px, py) = (x as u32, y as u32);
    if px < canvas.width() && py < canvas.height() {
        canvas.put_pixel(px, py, color);
    }
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, CertiflowError> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| CertiflowError::Render(format!("PNG encode failed: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Template;
    use image::GenericImageView;

    fn white_template(w: u32, h: u32) -> Template {
        let img = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        Template::Raster(DynamicImage::ImageRgba8(img))
    }

    fn name_field() -> Field {
        Field {
            y_percent: 50.0,
            font_size: 40.0,
            ..Field::text("1", "Name")
        }
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory(bytes).unwrap()
    }

    fn data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Column range (min_x, max_x) of non-white pixels in the rendered image.
    fn ink_bounds(img: &DynamicImage) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, px) in img.pixels() {
            if px.0[0..3] != [255, 255, 255] {
                bounds = Some(match bounds {
                    None => (x, x, y, y),
                    Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
                });
            }
        }
        bounds
    }

    #[test]
    fn canvas_keeps_template_dimensions() {
        let template = white_template(600, 400);
        let out = crate::render::render(
            &template,
            &[name_field()],
            &data(&[("Name", "Asha Rao")]),
            "CF-0001",
        )
        .unwrap();
        let img = decode(&out);
        assert_eq!((img.width(), img.height()), (600, 400));
    }

    #[test]
    fn centered_text_straddles_anchor() {
        // Spec scenario: 600×400, centered "Name" at (50%, 50%) → ink
        // horizontally centered on pixel column 300, vertically on row 200.
        let template = white_template(600, 400);
        let out = crate::render::render(
            &template,
            &[name_field()],
            &data(&[("Name", "Asha Rao")]),
            "CF-0001",
        )
        .unwrap();
        let (x0, x1, y0, y1) = ink_bounds(&decode(&out)).expect("text should leave ink");

        let mid_x = (x0 + x1) as f32 / 2.0;
        let mid_y = (y0 + y1) as f32 / 2.0;
        assert!((mid_x - 300.0).abs() <= 12.0, "mid_x = {mid_x}");
        assert!((mid_y - 200.0).abs() <= 12.0, "mid_y = {mid_y}");
        // Vertical extent stays within one glyph cell around the anchor.
        assert!(y0 >= 180 && y1 <= 220, "y range {y0}..{y1}");
    }

    #[test]
    fn right_aligned_text_ends_at_anchor() {
        let mut field = name_field();
        field.text_align = TextAlign::Right;
        let template = white_template(600, 400);
        let out = crate::render::render(
            &template,
            &[field],
            &data(&[("Name", "Asha Rao")]),
            "CF-0001",
        )
        .unwrap();
        let (_, x1, _, _) = ink_bounds(&decode(&out)).unwrap();
        assert!(x1 <= 300, "right-aligned ink must not cross the anchor, x1 = {x1}");
        assert!(x1 >= 280, "ink should end near the anchor, x1 = {x1}");
    }

    #[test]
    fn qr_placeholder_is_centered_square() {
        let mut field = Field::qr("q", "CertID");
        field.x_percent = 50.0;
        field.y_percent = 50.0;
        field.font_size = 20.0; // glyph side 60px
        let template = white_template(600, 400);
        let out =
            crate::render::render(&template, &[field], &HashMap::new(), "CF-0001").unwrap();
        let (x0, x1, y0, y1) = ink_bounds(&decode(&out)).unwrap();
        assert_eq!((x0, x1), (270, 329));
        assert_eq!((y0, y1), (170, 229));
    }

    #[test]
    fn rendering_is_idempotent() {
        let template = white_template(300, 200);
        let fields = vec![name_field(), Field::qr("q", "CertID")];
        let d = data(&[("Name", "Asha Rao")]);
        let a = crate::render::render(&template, &fields, &d, "CF-0001").unwrap();
        let b = crate::render::render(&template, &fields, &d, "CF-0001").unwrap();
        assert_eq!(a, b, "same inputs must produce byte-identical artifacts");
    }

    #[test]
    fn malformed_color_fails_without_mutating_inputs() {
        let template = white_template(100, 100);
        let mut field = name_field();
        field.font_color = "#zzzzzz".to_string();
        let err = crate::render::render(&template, &[field], &HashMap::new(), "CF-1").unwrap_err();
        assert!(matches!(err, CertiflowError::Render(_)));
    }

    #[test]
    fn offscreen_fields_are_clipped_not_fatal() {
        let template = white_template(100, 100);
        let mut field = name_field();
        field.x_percent = 99.0;
        field.y_percent = 1.0;
        crate::render::render(&template, &[field], &data(&[("Name", "A long name")]), "CF-1")
            .expect("clipped drawing must still succeed");
    }
}

//! Bitmap glyph generation for raster text stamping.
//!
//! Uses the Spleen bitmap font family, scaled to the requested field size
//! with nearest-neighbour sampling. Bitmap glyphs keep the output fully
//! deterministic: the same field layout renders to byte-identical pixels on
//! every platform, which the campaign runner relies on for idempotent
//! re-renders.

use spleen_font::{PSF2Font, FONT_12X24, FONT_16X32};

/// Character cell for a given field font size, preserving the 1:2 glyph
/// aspect ratio: `(width, height)` in pixels.
pub fn char_box(font_size: f32) -> (usize, usize) {
    let h = (font_size.round().max(2.0)) as usize;
    let w = (h / 2).max(1);
    (w, h)
}

/// Generate a glyph bitmap for a character at the given cell size.
/// Returns a row-major buffer where each byte is 0 (transparent) or 1 (ink).
pub fn glyph_bitmap(ch: char, char_w: usize, char_h: usize) -> Vec<u8> {
    let mut glyph = vec![0u8; char_w * char_h];

    // Pick the larger Spleen face when upscaling, the smaller when the
    // target cell is below its native size, so edges stay as crisp as a
    // nearest-neighbour resample allows.
    let (font_data, src_w, src_h) = if char_h >= 32 {
        (FONT_16X32, 16usize, 32usize)
    } else {
        (FONT_12X24, 12usize, 24usize)
    };

    let mut spleen = PSF2Font::new(font_data).unwrap();
    let utf8 = ch.to_string();

    if let Some(spleen_glyph) = spleen.glyph_for_utf8(utf8.as_bytes()) {
        let mut src = vec![0u8; src_w * src_h];
        for (row_y, row) in spleen_glyph.enumerate() {
            for (col_x, on) in row.enumerate() {
                if row_y < src_h && col_x < src_w {
                    src[row_y * src_w + col_x] = u8::from(on);
                }
            }
        }
        scale_bitmap(&src, src_w, src_h, &mut glyph, char_w, char_h);
    } else {
        // Unknown character: draw a box so the gap is visible in the output.
        draw_box(&mut glyph, char_w, char_h);
    }

    glyph
}

/// Scale a bitmap from src dimensions to dst dimensions using nearest neighbor.
fn scale_bitmap(src: &[u8], src_w: usize, src_h: usize, dst: &mut [u8], dst_w: usize, dst_h: usize) {
    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx * src_w / dst_w;
            let sy = dy * src_h / dst_h;
            let src_idx = sy * src_w + sx;
            let dst_idx = dy * dst_w + dx;
            if src_idx < src.len() && dst_idx < dst.len() {
                dst[dst_idx] = src[src_idx];
            }
        }
    }
}

/// Draw a box outline in the glyph buffer.
fn draw_box(glyph: &mut [u8], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }
    for x in 0..width {
        glyph[x] = 1;
        glyph[(height - 1) * width + x] = 1;
    }
    for y in 0..height {
        glyph[y * width] = 1;
        glyph[y * width + width - 1] = 1;
    }
}

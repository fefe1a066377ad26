//! Helvetica-Bold advance widths.
//!
//! The document variant aligns text by shifting the X origin left by the
//! rendered text width, since the PDF text operator anchors at the left
//! edge and baseline. Widths come from the standard Adobe AFM data for
//! Helvetica-Bold, expressed in 1/1000ths of the font size.

/// Advance widths for ASCII 32..=126, per mille of font size.
const WIDTHS: [u16; 95] = [
    278, // space
    333, // !
    474, // "
    556, // #
    556, // $
    889, // %
    722, // &
    238, // '
    333, // (
    333, // )
    389, // *
    584, // +
    278, // ,
    333, // -
    278, // .
    278, // /
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    333, // :
    333, // ;
    584, // <
    584, // =
    584, // >
    611, // ?
    975, // @
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, // A-J
    722, 611, 833, 722, 778, 667, 778, 722, 667, 611, // K-T
    722, 667, 944, 667, 667, 611, // U-Z
    333, // [
    278, // \
    333, // ]
    584, // ^
    556, // _
    333, // `
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, // a-j
    556, 278, 889, 611, 611, 611, 611, 389, 556, 333, // k-t
    611, 556, 778, 556, 556, 500, // u-z
    389, // {
    280, // |
    389, // }
    584, // ~
];

/// Fallback for characters outside the table (digit width, a reasonable
/// average for Helvetica-Bold).
const DEFAULT_WIDTH: u16 = 556;

fn advance(ch: char) -> u16 {
    let code = ch as u32;
    if (32..=126).contains(&code) {
        WIDTHS[(code - 32) as usize]
    } else {
        DEFAULT_WIDTH
    }
}

/// Width of `text` rendered in Helvetica-Bold at `font_size` points.
pub fn helvetica_bold_width(text: &str, font_size: f32) -> f32 {
    let milli: u32 = text.chars().map(|c| u32::from(advance(c))).sum();
    milli as f32 * font_size / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_widths() {
        // "Hi" at 10pt: H = 722, i = 278 → 1000 milli-units → 10pt.
        assert_eq!(helvetica_bold_width("Hi", 10.0), 10.0);
        assert_eq!(helvetica_bold_width("", 40.0), 0.0);
    }

    #[test]
    fn width_scales_linearly_with_size() {
        let w12 = helvetica_bold_width("Asha Rao", 12.0);
        let w24 = helvetica_bold_width("Asha Rao", 24.0);
        assert!((w24 - 2.0 * w12).abs() < 1e-4);
    }

    #[test]
    fn non_ascii_uses_fallback() {
        assert_eq!(helvetica_bold_width("é", 10.0), 5.56);
    }
}

//! # Field Model
//!
//! The declarative schema for a positioned placeholder on a certificate
//! template. A field is either a text stamp (with font size, color and
//! horizontal alignment) or a QR placeholder glyph. Positions are stored as
//! percentages of the template dimensions so the same layout applies to any
//! template resolution, and so the visual editor and the renderer share one
//! coordinate system.

use serde::{Deserialize, Serialize};

use crate::error::CertiflowError;

/// What a field draws on the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldKind {
    /// A per-recipient text value, resolved through the placeholder resolver.
    #[default]
    Text,
    /// A QR placeholder glyph. Carries no text value; the resolver is never
    /// consulted for these.
    QrCode,
}

/// Horizontal alignment of a text field around its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// One visual placeholder on a template.
///
/// `x`/`y` are percentages (0–100) of the template width/height. The anchor
/// semantics depend on the kind: text is aligned horizontally per
/// [`TextAlign`] and centered vertically on the anchor; QR glyphs are
/// centered on the anchor in both dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Opaque unique identifier (assigned by the editor).
    pub id: String,
    /// Logical name, e.g. "Name", "Course", "CertID". Case-insensitive at
    /// resolution time.
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    /// Horizontal position as a percentage of template width.
    #[serde(rename = "x")]
    pub x_percent: f32,
    /// Vertical position as a percentage of template height (top-down).
    #[serde(rename = "y")]
    pub y_percent: f32,
    /// Text height in pixels/points. For QR fields this doubles as the size
    /// multiplier of the glyph's bounding box.
    pub font_size: f32,
    /// `#rrggbb` hex color. Text fields only.
    #[serde(default = "default_color")]
    pub font_color: String,
    #[serde(default)]
    pub text_align: TextAlign,
}

fn default_color() -> String {
    "#000000".to_string()
}

impl Field {
    /// Create a text field with the default styling used for new fields.
    pub fn text(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            kind: FieldKind::Text,
            x_percent: 50.0,
            y_percent: 50.0,
            font_size: 32.0,
            font_color: default_color(),
            text_align: TextAlign::Center,
        }
    }

    /// Create a QR placeholder field.
    pub fn qr(id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::QrCode,
            ..Self::text(id, key)
        }
    }

    /// The field layout a freshly created project starts with: a prominent
    /// centered "Name" and a smaller indigo "CertID" near the bottom.
    pub fn default_layout() -> Vec<Field> {
        vec![
            Field {
                y_percent: 45.0,
                font_size: 40.0,
                ..Field::text("1", "Name")
            },
            Field {
                y_percent: 85.0,
                font_size: 20.0,
                font_color: "#6366f1".to_string(),
                ..Field::text("2", "CertID")
            },
        ]
    }
}

/// An RGB color parsed from a `#rrggbb` field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    /// Parse a `#rrggbb` (or bare `rrggbb`) hex string.
    ///
    /// Malformed values are a render error: the field referenced a color the
    /// engine cannot honor, and silently substituting one would break visual
    /// parity with the editor preview.
    pub fn from_hex(hex: &str) -> Result<Color, CertiflowError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CertiflowError::Render(format!(
                "malformed color value: {hex:?}"
            )));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|e| CertiflowError::Render(format!("malformed color value {hex:?}: {e}")))
        };
        Ok(Color {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Channels as 0.0–1.0 floats, the scale PDF `rg` operators use.
    pub fn to_unit(self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_color() {
        assert_eq!(
            Color::from_hex("#6366f1").unwrap(),
            Color {
                r: 0x63,
                g: 0x66,
                b: 0xf1
            }
        );
        assert_eq!(Color::from_hex("000000").unwrap(), Color::BLACK);
    }

    #[test]
    fn malformed_color_is_render_error() {
        for bad in ["#12345", "#12345g", "", "#1234567", "red"] {
            let err = Color::from_hex(bad).unwrap_err();
            assert!(matches!(err, CertiflowError::Render(_)), "{bad}");
            assert!(!err.is_batch_fatal());
        }
    }

    #[test]
    fn field_json_round_trip_matches_editor_shape() {
        let json = r##"{
            "id": "1",
            "key": "Name",
            "type": "TEXT",
            "x": 50,
            "y": 45,
            "fontSize": 40,
            "fontColor": "#000000",
            "textAlign": "center"
        }"##;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(field.kind, FieldKind::Text);
        assert_eq!(field.x_percent, 50.0);
        assert_eq!(field.y_percent, 45.0);
        assert_eq!(field.text_align, TextAlign::Center);

        let back = serde_json::to_value(&field).unwrap();
        assert_eq!(back["type"], "TEXT");
        assert_eq!(back["fontSize"], 40.0);
    }

    #[test]
    fn text_align_defaults_to_center() {
        let json = r##"{"id":"q","key":"CertID","type":"QR_CODE","x":10,"y":10,"fontSize":24}"##;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(field.kind, FieldKind::QrCode);
        assert_eq!(field.text_align, TextAlign::Center);
        assert_eq!(field.font_color, "#000000");
    }
}

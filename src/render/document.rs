//! Document (PDF) rendering variant.
//!
//! Overlays the field layout onto the first page of an existing PDF
//! template by appending a content stream — the template's own objects are
//! never rewritten. PDF space has a bottom-left origin while field
//! percentages are top-down (matching the visual editor), so Y is inverted
//! here. Text alignment shifts the X origin left by the rendered width
//! because the `Tj` operator anchors at the left edge and baseline; this
//! asymmetry with the raster variant is deliberate, keeping visual parity
//! between the two template kinds.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::CertiflowError;
use crate::field::{Color, Field, FieldKind, TextAlign};
use crate::render::{anchor_px, helvetica_bold_width};
use crate::resolve::resolve;

/// Resource name the overlay font is registered under.
const FONT_RESOURCE: &str = "CfHelv";

/// QR placeholder squares are `font_size * 2` points per side here, a
/// coarser glyph than the raster variant's.
const QR_SCALE: f32 = 2.0;

fn load_error(e: impl std::fmt::Display) -> CertiflowError {
    CertiflowError::TemplateLoad(format!("cannot decode PDF template: {e}"))
}

fn render_error(e: impl std::fmt::Display) -> CertiflowError {
    CertiflowError::Render(format!("PDF overlay failed: {e}"))
}

/// Check that the bytes parse as a PDF with at least one page.
pub(super) fn validate(bytes: &[u8]) -> Result<(), CertiflowError> {
    let doc = Document::load_mem(bytes).map_err(load_error)?;
    if doc.get_pages().is_empty() {
        return Err(CertiflowError::TemplateLoad(
            "PDF template has no pages".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn render(
    bytes: &[u8],
    fields: &[Field],
    data: &HashMap<String, String>,
    cert_id: &str,
) -> Result<Vec<u8>, CertiflowError> {
    let mut doc = Document::load_mem(bytes).map_err(load_error)?;
    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| CertiflowError::TemplateLoad("PDF template has no pages".to_string()))?;
    let (width, height) = page_size(&doc, page_id);

    let mut operations = Vec::new();
    for field in fields {
        let (ax, top_down_y) = anchor_px(field.x_percent, field.y_percent, width, height);
        let ay = height - top_down_y;

        match field.kind {
            FieldKind::Text => {
                let text = resolve(&field.key, data, cert_id);
                let (r, g, b) = Color::from_hex(&field.font_color)?.to_unit();

                let x = match field.text_align {
                    TextAlign::Left => ax,
                    TextAlign::Center => ax - helvetica_bold_width(&text, field.font_size) / 2.0,
                    TextAlign::Right => ax - helvetica_bold_width(&text, field.font_size),
                };

                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![
                        Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                        field.font_size.into(),
                    ],
                ));
                operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
                operations.push(Operation::new("Td", vec![x.into(), ay.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(text.as_bytes().to_vec())],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            FieldKind::QrCode => {
                let side = field.font_size * QR_SCALE;
                operations.push(Operation::new(
                    "rg",
                    vec![0.0f32.into(), 0.0f32.into(), 0.0f32.into()],
                ));
                operations.push(Operation::new(
                    "re",
                    vec![
                        (ax - field.font_size).into(),
                        (ay - field.font_size).into(),
                        side.into(),
                        side.into(),
                    ],
                ));
                operations.push(Operation::new("f", vec![]));
            }
        }
    }

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    register_font(&mut doc, page_id, font_id)?;
    append_content(&mut doc, page_id, Content { operations })?;

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(render_error)?;
    Ok(out)
}

/// Page dimensions from the MediaBox, walking up the page tree for
/// inherited boxes. Falls back to US Letter when absent, matching what
/// viewers assume.
fn page_size(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let mut dict = match doc.get_dictionary(page_id) {
        Ok(d) => d,
        Err(_) => return (612.0, 792.0),
    };

    loop {
        if let Ok(media_box) = dict.get(b"MediaBox") {
            let resolved = match media_box {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
            if let Some(Object::Array(values)) = resolved {
                let nums: Vec<f32> = values.iter().filter_map(as_f32).collect();
                if nums.len() == 4 {
                    return (nums[2] - nums[0], nums[3] - nums[1]);
                }
            }
            return (612.0, 792.0);
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => match doc.get_dictionary(*parent_id) {
                Ok(parent) => dict = parent,
                Err(_) => return (612.0, 792.0),
            },
            _ => return (612.0, 792.0),
        }
    }
}

fn as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Register the overlay font on the page, preserving whatever resources the
/// template already carries (including inherited ones, which get copied down
/// to the page so the original content keeps resolving).
fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), CertiflowError> {
    let mut resources = resources_snapshot(doc, page_id);

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => doc
            .get_dictionary(*id)
            .map(Dictionary::clone)
            .unwrap_or_default(),
        _ => Dictionary::new(),
    };
    fonts.set(FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(render_error)?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// The page's effective resources dictionary, resolving references and
/// walking the parent chain for inherited resources.
fn resources_snapshot(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_dictionary(page_id).ok();
    while let Some(dict) = current {
        match dict.get(b"Resources") {
            Ok(Object::Dictionary(d)) => return d.clone(),
            Ok(Object::Reference(id)) => {
                return doc
                    .get_dictionary(*id)
                    .map(Dictionary::clone)
                    .unwrap_or_default();
            }
            _ => {}
        }
        current = match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => doc.get_dictionary(*parent_id).ok(),
            _ => None,
        };
    }
    Dictionary::new()
}

/// Append the overlay as an additional content stream, keeping the
/// template's existing streams untouched.
fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Content,
) -> Result<(), CertiflowError> {
    let encoded = content.encode().map_err(render_error)?;
    let stream_id = doc.add_object(Object::Stream(Stream::new(dictionary! {}, encoded)));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(render_error)?;

    let contents = page.get(b"Contents").ok().cloned();
    let new_contents = match contents {
        Some(Object::Array(mut streams)) => {
            streams.push(Object::Reference(stream_id));
            Object::Array(streams)
        }
        Some(existing) => Object::Array(vec![existing, Object::Reference(stream_id)]),
        None => Object::Reference(stream_id),
    };
    page.set("Contents", new_contents);
    Ok(())
}

//! IIIF Presentation v3 manifest parsing
//!
//! Turns raw manifest JSON into a [`ManifestState`]. Structural problems
//! abort the whole parse; a single bad annotation is dropped and the rest of
//! the canvas is kept.

use crate::target::decode_target;
use iiif_model::{epoch_millis, AnnotationData, AnnotationsByCanvas, CanvasInfo, ManifestState};
use serde_json::Value;
use std::collections::BTreeMap;

pub const UNTITLED_MANIFEST: &str = "Untitled Manifest";

const SUPPLEMENTING: &str = "supplementing";

/// Fatal structural problems in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("document is not a IIIF Presentation v3 Manifest")]
    NotAManifest,
    #[error("manifest contains no canvases")]
    NoCanvases,
    #[error("canvas #{index} is malformed (expected type \"Canvas\" and a string id)")]
    MalformedCanvas { index: usize },
}

/// Parse a manifest. No partial state is returned on error.
pub fn parse_manifest(manifest: &Value) -> Result<ManifestState, FormatError> {
    if manifest.get("type").and_then(Value::as_str) != Some("Manifest") {
        return Err(FormatError::NotAManifest);
    }

    let items = manifest.get("items").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    if items.is_empty() {
        return Err(FormatError::NoCanvases);
    }

    let now = epoch_millis();
    let canvases = items
        .iter()
        .enumerate()
        .map(|(index, canvas)| parse_canvas(canvas, index, now))
        .collect::<Result<Vec<_>, _>>()?;

    let label = parse_label(manifest.get("label"));
    Ok(ManifestState {
        id: get_string(manifest.get("id")),
        label: if label.is_empty() { UNTITLED_MANIFEST.to_owned() } else { label },
        canvases,
    })
}

fn parse_canvas(canvas: &Value, index: usize, now: i64) -> Result<CanvasInfo, FormatError> {
    let id = match (canvas.get("type").and_then(Value::as_str), canvas.get("id")) {
        (Some("Canvas"), Some(Value::String(id))) => id.clone(),
        _ => return Err(FormatError::MalformedCanvas { index: index + 1 }),
    };

    let label = parse_label(canvas.get("label"));
    let (image_service, image_url) = canvas_image(canvas);
    let existing_annotations = parse_supplementing_annotations(canvas, &id, now);

    Ok(CanvasInfo {
        label: if label.is_empty() { format!("Canvas {}", index + 1) } else { label },
        width: parse_dimension(canvas.get("width")),
        height: parse_dimension(canvas.get("height")),
        thumbnail: first_or_self(canvas.get("thumbnail")).and_then(|t| get_string(t.get("id"))),
        image_service,
        image_url,
        existing_annotations,
        id,
    })
}

/// Plain string, or the first string of the first entry of a language map.
pub fn parse_label(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(label)) => label.clone(),
        Some(Value::Object(map)) => map
            .values()
            .next()
            .and_then(Value::as_array)
            .and_then(|strings| strings.first())
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Image service base and direct image id from the first painting body.
fn canvas_image(canvas: &Value) -> (Option<String>, Option<String>) {
    let Some(body) = canvas
        .get("items")
        .and_then(|pages| pages.get(0))
        .and_then(|page| page.get("items"))
        .and_then(|annotations| annotations.get(0))
        .and_then(|annotation| annotation.get("body"))
    else {
        return (None, None);
    };

    let service = first_or_self(body.get("service"))
        .and_then(|service| get_string(service.get("id")).or_else(|| get_string(service.get("@id"))));
    (service, get_string(body.get("id")))
}

fn parse_supplementing_annotations(canvas: &Value, canvas_id: &str, now: i64) -> Vec<AnnotationData> {
    let pages = canvas.get("annotations").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    let mut result = Vec::new();

    for page in pages {
        let items = page.get("items").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        for (index, item) in items.iter().enumerate() {
            if item.get("type").and_then(Value::as_str) != Some("Annotation")
                || item.get("motivation").and_then(Value::as_str) != Some(SUPPLEMENTING)
            {
                continue;
            }

            let Some(target) = item.get("target").and_then(Value::as_str).and_then(decode_target)
            else {
                tracing::debug!(canvas_id, index, "dropping supplementing annotation with unusable target");
                continue;
            };

            let (text, language) = textual_body(item);
            result.push(AnnotationData {
                id: annotation_id(item).unwrap_or_else(|| format!("{canvas_id}-legacy-{index}")),
                canvas_id: target.canvas_id,
                rect: target.rect,
                text,
                language,
                created_at: now + index as i64,
                extras: BTreeMap::new(),
            });
        }
    }

    result
}

/// Decode a previously saved annotation page for one canvas.
///
/// Returns `None` when the page carries no `items` array, in which case the
/// caller falls back to the annotations embedded in the manifest.
pub fn annotations_from_saved_page(canvas: &CanvasInfo, page: &Value) -> Option<Vec<AnnotationData>> {
    let items = page.get("items").and_then(Value::as_array)?;
    let now = epoch_millis();

    let annotations = items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let Some(target) = item.get("target").and_then(Value::as_str).and_then(decode_target)
            else {
                tracing::debug!(canvas_id = %canvas.id, index, "dropping saved annotation with unusable target");
                return None;
            };

            let (text, language) = textual_body(item);
            Some(AnnotationData {
                id: annotation_id(item).unwrap_or_else(|| format!("{}-{index}", canvas.id)),
                canvas_id: canvas.id.clone(),
                rect: target.rect,
                text,
                language,
                created_at: now + index as i64,
                extras: BTreeMap::new(),
            })
        })
        .collect();

    Some(annotations)
}

/// Build the working per-canvas lists: saved pages (keyed by canvas index)
/// win over annotations embedded in the manifest.
pub fn resolve_annotations(
    manifest: &ManifestState,
    saved_pages: &BTreeMap<usize, Value>,
) -> AnnotationsByCanvas {
    manifest
        .canvases
        .iter()
        .enumerate()
        .map(|(index, canvas)| {
            let annotations = saved_pages
                .get(&index)
                .and_then(|page| annotations_from_saved_page(canvas, page))
                .unwrap_or_else(|| canvas.existing_annotations.clone());
            (canvas.id.clone(), annotations)
        })
        .collect()
}

fn textual_body(item: &Value) -> (String, String) {
    let body = item.get("body");
    let text = body.and_then(|b| get_string(b.get("value"))).unwrap_or_default();
    let language = body.and_then(|b| get_string(b.get("language"))).unwrap_or_default();
    (text, language)
}

fn parse_dimension(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (number.is_finite() && number > 0.0).then_some(number)
}

fn first_or_self(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Array(entries) => entries.first(),
        other => Some(other),
    }
}

fn get_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_owned)
}

/// An empty id counts as missing.
fn annotation_id(item: &Value) -> Option<String> {
    get_string(item.get("id")).filter(|id| !id.is_empty())
}

//! OCR result import
//!
//! Converts line-level OCR output (quadrilateral bounding boxes in the
//! pixel space of the scanned image) into annotations on a canvas.

use iiif_model::{epoch_millis, AnnotationData, AnnotationsByCanvas, ManifestState, Rect};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    pub contents: Vec<Vec<OcrLine>>,
    #[serde(default)]
    pub imginfo: OcrImageInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrLine {
    pub bounding_box: Vec<[f64; 2]>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Producers emit these flags as strings or booleans.
    #[serde(default)]
    pub is_vertical: Option<Value>,
    #[serde(default)]
    pub is_textline: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OcrImageInfo {
    #[serde(default)]
    pub img_width: Option<f64>,
    #[serde(default)]
    pub img_height: Option<f64>,
    #[serde(default)]
    pub img_path: Option<String>,
    #[serde(default)]
    pub img_name: Option<String>,
}

/// Dimensions of the destination canvas, when known.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetSize {
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl TargetSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height) }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OcrImportError {
    #[error("{file}: invalid OCR JSON: {source}")]
    InvalidJson {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{file}: no canvas matches this file")]
    NoMatchingCanvas { file: String },
}

/// Convert an OCR document into annotations for `canvas_id`.
pub fn import_ocr(
    doc: &OcrDocument,
    canvas_id: &str,
    language: &str,
    target: TargetSize,
) -> Vec<AnnotationData> {
    import_ocr_at(doc, canvas_id, language, target, epoch_millis(), 0)
}

/// Like [`import_ocr`], but numbers the new ids past every OCR id already
/// minted in the same millisecond among `existing`.
pub fn import_ocr_after(
    doc: &OcrDocument,
    canvas_id: &str,
    language: &str,
    target: TargetSize,
    existing: &AnnotationsByCanvas,
) -> Vec<AnnotationData> {
    let now = epoch_millis();
    let first = first_free_index(existing.values().flatten(), now);
    import_ocr_at(doc, canvas_id, language, target, now, first)
}

/// One past the highest `m` among `ocr-{now}-{m}` ids in `existing`.
fn first_free_index<'a>(existing: impl IntoIterator<Item = &'a AnnotationData>, now: i64) -> usize {
    let prefix = format!("ocr-{now}-");
    existing
        .into_iter()
        .filter_map(|a| a.id.strip_prefix(prefix.as_str())?.parse::<usize>().ok())
        .map(|n| n + 1)
        .max()
        .unwrap_or(0)
}

fn import_ocr_at(
    doc: &OcrDocument,
    canvas_id: &str,
    language: &str,
    target: TargetSize,
    now: i64,
    first_index: usize,
) -> Vec<AnnotationData> {
    let scale_x = axis_scale(doc.imginfo.img_width, target.width);
    let scale_y = axis_scale(doc.imginfo.img_height, target.height);

    doc.contents
        .iter()
        .flatten()
        .filter(|line| !line.text.trim().is_empty())
        .filter_map(|line| {
            let (min_x, max_x) = axis_extent(line.bounding_box.iter().map(|p| p[0] * scale_x))?;
            let (min_y, max_y) = axis_extent(line.bounding_box.iter().map(|p| p[1] * scale_y))?;
            let (min_x, max_x) = clamp_to_axis(min_x, max_x, target.width);
            let (min_y, max_y) = clamp_to_axis(min_y, max_y, target.height);
            Some((line, Rect::new(min_x, min_y, (max_x - min_x).max(0.0), (max_y - min_y).max(0.0))))
        })
        .enumerate()
        .map(|(offset, (line, rect))| {
            let index = first_index + offset;
            let mut extras = BTreeMap::new();
            if let Some(confidence) = line.confidence {
                extras.insert("confidence".to_owned(), Value::from(confidence));
            }
            AnnotationData {
                id: format!("ocr-{now}-{index}"),
                canvas_id: canvas_id.to_owned(),
                rect,
                text: line.text.clone(),
                language: language.to_owned(),
                created_at: now + index as i64,
                extras,
            }
        })
        .collect()
}

fn axis_scale(source: Option<f64>, target: Option<f64>) -> f64 {
    match (source, target) {
        (Some(source), Some(target)) if source > 0.0 && target > 0.0 => target / source,
        _ => 1.0,
    }
}

fn axis_extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

fn clamp_to_axis(min: f64, max: f64, limit: Option<f64>) -> (f64, f64) {
    match limit {
        Some(limit) if limit > 0.0 => (min.max(0.0).min(limit), max.max(0.0).min(limit)),
        _ => (min, max),
    }
}

/// Outcome of importing several OCR files against one manifest.
#[derive(Debug, Default)]
pub struct BatchImport {
    /// Full replacement lists for every canvas that received annotations.
    pub updated: AnnotationsByCanvas,
    pub errors: Vec<OcrImportError>,
}

impl BatchImport {
    pub fn imported_count(&self, current: &AnnotationsByCanvas) -> usize {
        self.updated
            .iter()
            .map(|(canvas_id, list)| {
                list.len().saturating_sub(current.get(canvas_id).map_or(0, Vec::len))
            })
            .sum()
    }
}

/// Import `(file_name, json_text)` pairs, matching each file to a canvas.
pub fn import_ocr_batch<'a>(
    manifest: &ManifestState,
    files: impl IntoIterator<Item = (&'a str, &'a str)>,
    language: &str,
    current: &AnnotationsByCanvas,
) -> BatchImport {
    let mut batch = BatchImport::default();
    // One clock reading for the whole batch; the running index keeps ids
    // distinct across files.
    let now = epoch_millis();
    let mut next_index = first_free_index(current.values().flatten(), now);

    for (file_name, json_text) in files {
        let doc: OcrDocument = match serde_json::from_str(json_text) {
            Ok(doc) => doc,
            Err(source) => {
                tracing::warn!(file = file_name, error = %source, "skipping unreadable OCR file");
                batch.errors.push(OcrImportError::InvalidJson { file: file_name.to_owned(), source });
                continue;
            }
        };

        let Some(index) = match_canvas(manifest, file_name) else {
            tracing::warn!(file = file_name, "no canvas matches OCR file");
            batch.errors.push(OcrImportError::NoMatchingCanvas { file: file_name.to_owned() });
            continue;
        };
        let Some(canvas) = manifest.canvas(index) else {
            continue;
        };

        let target = TargetSize { width: canvas.width, height: canvas.height };
        let imported = import_ocr_at(&doc, &canvas.id, language, target, now, next_index);
        next_index += imported.len();
        tracing::info!(file = file_name, canvas_id = %canvas.id, count = imported.len(), "imported OCR lines");

        let list = batch
            .updated
            .entry(canvas.id.clone())
            .or_insert_with(|| current.get(&canvas.id).cloned().unwrap_or_default());
        list.extend(imported);
    }

    batch
}

/// Canvas index for an OCR file: a canvas labelled exactly like the file
/// name without its `.json` suffix, otherwise a trailing `_<digits>` read as
/// a 1-based canvas number.
pub fn match_canvas(manifest: &ManifestState, file_name: &str) -> Option<usize> {
    let stem = strip_json_suffix(file_name);

    if let Some(index) = manifest.index_of_label(stem) {
        return Some(index);
    }

    let (_, digits) = stem.rsplit_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: usize = digits.parse().ok()?;
    let index = number.checked_sub(1)?;
    (index < manifest.len()).then_some(index)
}

fn strip_json_suffix(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    match base.len().checked_sub(5) {
        Some(split) if base.is_char_boundary(split) && base[split..].eq_ignore_ascii_case(".json") => {
            &base[..split]
        }
        _ => base,
    }
}

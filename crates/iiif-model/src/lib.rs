use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Path appended to a IIIF Image API service base to request the full image.
pub const IMAGE_API_FULL_SUFFIX: &str = "/full/full/0/default.jpg";

pub const DEFAULT_LANGUAGE: &str = "ja";

/// Annotation lists keyed by canvas id.
pub type AnnotationsByCanvas = BTreeMap<String, Vec<AnnotationData>>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in canvas pixel space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Box spanned by two arbitrary corner points.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self { x: a.x.min(b.x), y: a.y.min(b.y), w: (b.x - a.x).abs(), h: (b.y - a.y).abs() }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn contains_rect(&self, rect: &Rect) -> bool {
        rect.x >= 0.0 && rect.y >= 0.0 && rect.right() <= self.width && rect.bottom() <= self.height
    }
}

/// One page of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasInfo {
    pub id: String,
    pub label: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub thumbnail: Option<String>,
    pub image_service: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub existing_annotations: Vec<AnnotationData>,
}

impl CanvasInfo {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            width: None,
            height: None,
            thumbnail: None,
            image_service: None,
            image_url: None,
            existing_annotations: Vec::new(),
        }
    }

    /// Pixel size, only when both dimensions are known.
    pub fn size(&self) -> Option<CanvasSize> {
        match (self.width, self.height) {
            (Some(width), Some(height)) if width > 0.0 && height > 0.0 => {
                Some(CanvasSize { width, height })
            }
            _ => None,
        }
    }

    /// Replace the declared size with the natural size of the loaded image.
    pub fn refine_size(&mut self, width: f64, height: f64) {
        if width > 0.0 && height > 0.0 {
            self.width = Some(width);
            self.height = Some(height);
        }
    }

    /// URL to fetch for display; `None` means the canvas has no image.
    pub fn image_request_url(&self) -> Option<String> {
        if let Some(service) = &self.image_service {
            return Some(format!("{}{IMAGE_API_FULL_SUFFIX}", service.trim_end_matches('/')));
        }
        self.image_url.clone()
    }
}

/// One transcribed region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationData {
    pub id: String,
    pub canvas_id: String,
    #[serde(flatten)]
    pub rect: Rect,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub created_at: i64,
    /// Values outside the IIIF vocabulary (e.g. OCR confidence). Never exported.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

impl AnnotationData {
    pub fn new(id: impl Into<String>, canvas_id: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: id.into(),
            canvas_id: canvas_id.into(),
            rect,
            text: String::new(),
            language: String::new(),
            created_at: epoch_millis(),
            extras: BTreeMap::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

/// Top-to-bottom presentation order. Ties keep creation order.
pub fn reading_order(annotations: &[AnnotationData]) -> Vec<&AnnotationData> {
    let mut sorted: Vec<&AnnotationData> = annotations.iter().collect();
    sorted.sort_by(|a, b| a.rect.y.total_cmp(&b.rect.y).then(a.created_at.cmp(&b.created_at)));
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestState {
    pub id: Option<String>,
    pub label: String,
    pub canvases: Vec<CanvasInfo>,
}

impl ManifestState {
    pub fn canvas(&self, index: usize) -> Option<&CanvasInfo> {
        self.canvases.get(index)
    }

    pub fn canvas_mut(&mut self, index: usize) -> Option<&mut CanvasInfo> {
        self.canvases.get_mut(index)
    }

    pub fn index_of(&self, canvas_id: &str) -> Option<usize> {
        self.canvases.iter().position(|canvas| canvas.id == canvas_id)
    }

    pub fn index_of_label(&self, label: &str) -> Option<usize> {
        self.canvases.iter().position(|canvas| canvas.label == label)
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    /// Ask before deleting an annotation.
    pub safe_delete: bool,
    pub default_language: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self { safe_delete: true, default_language: DEFAULT_LANGUAGE.to_owned() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    ManifestUrl,
    ManifestFile,
    FileUpload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub id: String,
    pub name: String,
    pub source_type: SourceType,
    pub source_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn epoch_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

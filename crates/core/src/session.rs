//! Editing session over one manifest
//!
//! Owns the per-canvas annotation lists and applies editor intents to them.
//! Every change that should reach storage comes back to the caller as a
//! [`CanvasSave`], either immediately or once its debounce window elapses.

use crate::annotation::{self, AnnotationIdGenerator};
use crate::editor::{reduce, EditorEvent, EditorIntent, EditorState};
use crate::export::build_manifest_with_annotations;
use crate::manifest::{parse_manifest, resolve_annotations, FormatError};
use crate::ocr::{import_ocr_after, import_ocr_batch, OcrDocument, OcrImportError, TargetSize};
use crate::save_scheduler::{CanvasSave, SaveScheduler, SaveSchedulerConfig};
use crate::viewport::EditorConfig;
use iiif_model::{
    epoch_millis, reading_order, AnnotationData, AnnotationsByCanvas, CanvasInfo, ManifestState,
    UserSettings,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug)]
pub struct AnnotatorSession {
    manifest: ManifestState,
    raw_manifest: Value,
    annotations: AnnotationsByCanvas,
    current: usize,
    editor: EditorState,
    settings: UserSettings,
    scheduler: SaveScheduler,
    ids: AnnotationIdGenerator,
    /// A move/resize changed geometry since the gesture began.
    gesture_dirty: bool,
}

impl AnnotatorSession {
    /// Parse `raw` and seed every canvas from its saved page, falling back to
    /// the annotations embedded in the manifest.
    pub fn open(
        raw: Value,
        saved_pages: &BTreeMap<usize, Value>,
        settings: UserSettings,
    ) -> Result<Self, FormatError> {
        let manifest = parse_manifest(&raw)?;
        let annotations = resolve_annotations(&manifest, saved_pages);
        tracing::debug!(
            canvases = manifest.len(),
            saved_pages = saved_pages.len(),
            "opened manifest"
        );

        let mut session = Self {
            manifest,
            raw_manifest: raw,
            annotations,
            current: 0,
            editor: EditorState::default(),
            settings,
            scheduler: SaveScheduler::default(),
            ids: AnnotationIdGenerator::default(),
            gesture_dirty: false,
        };
        session.reset_editor();
        Ok(session)
    }

    pub fn with_editor_config(mut self, config: EditorConfig) -> Self {
        self.editor.config = config;
        self
    }

    pub fn with_save_config(mut self, config: SaveSchedulerConfig) -> Self {
        self.scheduler = SaveScheduler::new(config);
        self
    }

    pub fn manifest(&self) -> &ManifestState {
        &self.manifest
    }

    pub fn raw_manifest(&self) -> &Value {
        &self.raw_manifest
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: UserSettings) {
        self.settings = settings;
    }

    pub fn editor(&self) -> &EditorState {
        &self.editor
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_canvas(&self) -> Option<&CanvasInfo> {
        self.manifest.canvas(self.current)
    }

    pub fn annotations_by_canvas(&self) -> &AnnotationsByCanvas {
        &self.annotations
    }

    pub fn annotations(&self, canvas_id: &str) -> &[AnnotationData] {
        self.annotations.get(canvas_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current canvas's annotations, top to bottom.
    pub fn current_annotations(&self) -> Vec<&AnnotationData> {
        self.current_canvas()
            .map(|canvas| reading_order(self.annotations(&canvas.id)))
            .unwrap_or_default()
    }

    /// Annotation count for every canvas, in manifest order.
    pub fn annotation_counts(&self) -> Vec<usize> {
        self.manifest.canvases.iter().map(|canvas| self.annotations(&canvas.id).len()).collect()
    }

    /// Switch canvases. Out-of-range indices are clamped; the editor is reset.
    pub fn go_to_canvas(&mut self, index: usize) -> usize {
        let last = self.manifest.len().saturating_sub(1);
        self.current = index.min(last);
        self.reset_editor();
        self.current
    }

    pub fn next_canvas(&mut self) -> usize {
        self.go_to_canvas(self.current + 1)
    }

    pub fn previous_canvas(&mut self) -> usize {
        self.go_to_canvas(self.current.saturating_sub(1))
    }

    /// The current canvas's image finished loading at its natural size.
    pub fn image_loaded(&mut self, width: f64, height: f64) {
        if let Some(canvas) = self.manifest.canvas_mut(self.current) {
            canvas.refine_size(width, height);
        }
        self.apply_event(EditorEvent::ImageLoaded { width, height }, Instant::now());
    }

    /// Feed one editor event. Returns lists that must be written right away.
    pub fn dispatch(&mut self, event: EditorEvent, now: Instant) -> Vec<CanvasSave> {
        self.apply_event(event, now)
    }

    fn apply_event(&mut self, event: EditorEvent, now: Instant) -> Vec<CanvasSave> {
        let Some(canvas_id) = self.current_canvas().map(|canvas| canvas.id.clone()) else {
            return Vec::new();
        };

        let list = self.annotations.get(&canvas_id).map(Vec::as_slice).unwrap_or(&[]);
        let (editor, intents) = reduce(std::mem::take(&mut self.editor), list, event);
        self.editor = editor;

        let mut immediate = Vec::new();
        for intent in intents {
            match intent {
                EditorIntent::Create { canvas_id, rect } => {
                    let (id, created_at) = self.ids.next_id(epoch_millis());
                    let annotation = AnnotationData {
                        created_at,
                        language: self.settings.default_language.clone(),
                        ..AnnotationData::new(id.clone(), canvas_id.clone(), rect)
                    };
                    tracing::debug!(%canvas_id, %id, "created annotation");
                    self.annotations.entry(canvas_id).or_default().push(annotation);
                    self.editor.selected = Some(id);
                    self.editor.draw_mode = false;
                    self.schedule_current(now);
                }
                EditorIntent::Update { id, rect } => {
                    if let Some(list) = self.annotations.get_mut(&canvas_id) {
                        self.gesture_dirty |= annotation::set_rect(list, &id, rect);
                    }
                }
                EditorIntent::Select(_) => {}
                EditorIntent::Delete { id } => {
                    if let Some(list) = self.annotations.get_mut(&canvas_id) {
                        if annotation::remove(list, &id).is_some() {
                            self.schedule_current(now);
                        }
                    }
                }
                EditorIntent::GestureEnded { .. } => {
                    if std::mem::take(&mut self.gesture_dirty) {
                        self.scheduler.cancel(self.current);
                        immediate.extend(self.snapshot(self.current));
                    }
                }
            }
        }
        immediate
    }

    pub fn set_text(&mut self, id: &str, text: &str, now: Instant) -> bool {
        self.edit_current(now, |list| annotation::set_text(list, id, text))
    }

    pub fn set_language(&mut self, id: &str, language: &str, now: Instant) -> bool {
        self.edit_current(now, |list| annotation::set_language(list, id, language))
    }

    pub fn delete_annotation(&mut self, id: &str, now: Instant) -> bool {
        let removed = self.edit_current(now, |list| annotation::remove(list, id).is_some());
        if removed && self.editor.selected.as_deref() == Some(id) {
            self.editor.selected = None;
        }
        removed
    }

    /// Append OCR lines to the current canvas and write it immediately.
    pub fn import_ocr(&mut self, doc: &OcrDocument) -> Option<CanvasSave> {
        let canvas = self.current_canvas()?;
        let canvas_id = canvas.id.clone();
        let target = TargetSize { width: canvas.width, height: canvas.height };
        let imported =
            import_ocr_after(doc, &canvas_id, &self.settings.default_language, target, &self.annotations);
        tracing::info!(%canvas_id, count = imported.len(), "imported OCR lines");

        self.annotations.entry(canvas_id).or_default().extend(imported);
        self.scheduler.cancel(self.current);
        self.snapshot(self.current)
    }

    /// Import several OCR files, matching each one to a canvas by name.
    pub fn import_ocr_files<'a>(
        &mut self,
        files: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> (Vec<CanvasSave>, Vec<OcrImportError>) {
        let batch = import_ocr_batch(
            &self.manifest,
            files,
            &self.settings.default_language,
            &self.annotations,
        );

        let mut saves = Vec::new();
        for (canvas_id, list) in batch.updated {
            let Some(index) = self.manifest.index_of(&canvas_id) else {
                continue;
            };
            self.annotations.insert(canvas_id, list);
            self.scheduler.cancel(index);
            saves.extend(self.snapshot(index));
        }
        (saves, batch.errors)
    }

    /// Raw manifest with every canvas's current annotations embedded.
    pub fn export_manifest(&self) -> Value {
        build_manifest_with_annotations(&self.raw_manifest, &self.annotations)
    }

    pub fn poll_saves(&mut self, now: Instant) -> Vec<CanvasSave> {
        self.scheduler.take_due(now)
    }

    pub fn flush_saves(&mut self) -> Vec<CanvasSave> {
        self.scheduler.flush_all()
    }

    pub fn next_save_due(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    fn edit_current(&mut self, now: Instant, edit: impl FnOnce(&mut Vec<AnnotationData>) -> bool) -> bool {
        let Some(canvas_id) = self.current_canvas().map(|canvas| canvas.id.clone()) else {
            return false;
        };
        let changed = self.annotations.get_mut(&canvas_id).is_some_and(edit);
        if changed {
            self.schedule_current(now);
        }
        changed
    }

    fn schedule_current(&mut self, now: Instant) {
        if let Some(snapshot) = self.snapshot(self.current) {
            tracing::debug!(canvas_index = snapshot.canvas_index, "scheduled canvas save");
            self.scheduler.schedule(snapshot, now);
        }
    }

    /// Copy of a canvas's list with every annotation owned by that canvas.
    fn snapshot(&self, index: usize) -> Option<CanvasSave> {
        let canvas = self.manifest.canvas(index)?;
        let annotations = self
            .annotations(&canvas.id)
            .iter()
            .map(|a| AnnotationData { canvas_id: canvas.id.clone(), ..a.clone() })
            .collect();
        Some(CanvasSave { canvas_index: index, canvas_id: canvas.id.clone(), annotations })
    }

    fn reset_editor(&mut self) {
        self.gesture_dirty = false;
        let Some(canvas) = self.manifest.canvas(self.current) else {
            return;
        };
        let event = EditorEvent::CanvasChanged { canvas_id: canvas.id.clone(), size: canvas.size() };
        let (editor, _) = reduce(std::mem::take(&mut self.editor), &[], event);
        self.editor = editor;
    }
}

//! Rectangle editor state machine
//!
//! [`reduce`] folds one pointer/keyboard event into the editor state and
//! reports what should happen to the annotation list. The editor never owns
//! annotations; callers pass the current canvas list on every event and apply
//! the returned intents themselves.

use crate::manipulation::{hit_corner, move_rect, resize_rect, Corner};
use crate::viewport::{EditorConfig, Viewport};
use iiif_model::{AnnotationData, CanvasSize, Point, Rect};

/// The gesture in progress. Positions named `last`/`origin` are viewport
/// pixels; `start` is a canvas coordinate.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragMode {
    #[default]
    Idle,
    Panning { last: Point },
    Drawing { start: Point },
    Moving { target_id: String, base: Rect, origin: Point },
    Resizing { corner: Corner, target_id: String, base: Rect, origin: Point },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EditorState {
    pub config: EditorConfig,
    pub viewport: Viewport,
    pub drag: DragMode,
    /// Rubber band shown while drawing.
    pub preview: Option<Rect>,
    pub selected: Option<String>,
    pub draw_mode: bool,
    pub canvas_id: Option<String>,
    pub canvas_size: Option<CanvasSize>,
}

impl EditorState {
    pub fn for_canvas(config: EditorConfig, canvas_id: impl Into<String>, size: Option<CanvasSize>) -> Self {
        Self { config, canvas_id: Some(canvas_id.into()), canvas_size: size, ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// Pointer positions are relative to the editor surface, in viewport pixels.
    PointerDown { position: Point },
    PointerMove { position: Point },
    PointerUp,
    PointerLeave,
    Wheel { delta_y: f64 },
    SetDrawMode(bool),
    CanvasChanged { canvas_id: String, size: Option<CanvasSize> },
    /// Natural size of the displayed image.
    ImageLoaded { width: f64, height: f64 },
    ResetViewport,
    Select(Option<String>),
    DeleteSelected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorIntent {
    Create { canvas_id: String, rect: Rect },
    Update { id: String, rect: Rect },
    Select(Option<String>),
    Delete { id: String },
    /// A move or resize finished; the canvas list should be persisted now.
    GestureEnded { canvas_id: String },
}

pub fn reduce(
    mut state: EditorState,
    annotations: &[AnnotationData],
    event: EditorEvent,
) -> (EditorState, Vec<EditorIntent>) {
    let mut intents = Vec::new();

    match event {
        EditorEvent::PointerDown { position } => {
            pointer_down(&mut state, annotations, position, &mut intents);
        }
        EditorEvent::PointerMove { position } => {
            pointer_move(&mut state, position, &mut intents);
        }
        EditorEvent::PointerUp | EditorEvent::PointerLeave => {
            pointer_up(&mut state, &mut intents);
        }
        EditorEvent::Wheel { delta_y } => {
            let config = state.config;
            state.viewport.zoom_by_wheel(delta_y, &config);
        }
        EditorEvent::SetDrawMode(enabled) => {
            state.draw_mode = enabled;
        }
        EditorEvent::CanvasChanged { canvas_id, size } => {
            state = EditorState {
                draw_mode: state.draw_mode,
                ..EditorState::for_canvas(state.config, canvas_id, size)
            };
        }
        EditorEvent::ImageLoaded { width, height } => {
            if width > 0.0 && height > 0.0 {
                state.canvas_size = Some(CanvasSize::new(width, height));
            }
        }
        EditorEvent::ResetViewport => {
            state.viewport = Viewport::default();
        }
        EditorEvent::Select(id) => {
            let id = id.filter(|id| annotations.iter().any(|a| &a.id == id));
            if state.selected != id {
                state.selected = id.clone();
                intents.push(EditorIntent::Select(id));
            }
        }
        EditorEvent::DeleteSelected => {
            if let Some(id) = state.selected.take() {
                if matches!(&state.drag, DragMode::Moving { target_id, .. } | DragMode::Resizing { target_id, .. } if *target_id == id)
                {
                    state.drag = DragMode::Idle;
                }
                intents.push(EditorIntent::Delete { id });
            }
        }
    }

    (state, intents)
}

fn pointer_down(
    state: &mut EditorState,
    annotations: &[AnnotationData],
    position: Point,
    intents: &mut Vec<EditorIntent>,
) {
    let Some(size) = state.canvas_size.filter(|_| state.canvas_id.is_some()) else {
        return;
    };

    if state.draw_mode {
        let start = state.viewport.to_image(position, size);
        state.drag = DragMode::Drawing { start };
        state.preview = Some(Rect::new(start.x, start.y, 0.0, 0.0));
        return;
    }

    // Unclamped, so a press beside the image cannot hit a rect on its edge.
    let point = state.viewport.to_canvas(position);

    let radius = state.config.handle_radius / state.viewport.zoom;
    let handle = state
        .selected
        .as_deref()
        .and_then(|id| annotations.iter().find(|a| a.id == id))
        .and_then(|selected| hit_corner(&selected.rect, point, radius).map(|corner| (corner, selected)));
    if let Some((corner, selected)) = handle {
        state.drag = DragMode::Resizing {
            corner,
            target_id: selected.id.clone(),
            base: selected.rect,
            origin: position,
        };
        return;
    }

    // Later entries are drawn on top.
    if let Some(hit) = annotations.iter().rev().find(|a| a.rect.contains(point)) {
        if state.selected.as_deref() != Some(hit.id.as_str()) {
            state.selected = Some(hit.id.clone());
            intents.push(EditorIntent::Select(Some(hit.id.clone())));
        }
        state.drag = DragMode::Moving { target_id: hit.id.clone(), base: hit.rect, origin: position };
        return;
    }

    if state.selected.take().is_some() {
        intents.push(EditorIntent::Select(None));
        return;
    }

    state.drag = DragMode::Panning { last: position };
}

fn pointer_move(state: &mut EditorState, position: Point, intents: &mut Vec<EditorIntent>) {
    let zoom = state.viewport.zoom;
    match &mut state.drag {
        DragMode::Idle => {}
        DragMode::Panning { last } => {
            let (dx, dy) = (position.x - last.x, position.y - last.y);
            *last = position;
            state.viewport.pan_by(dx, dy);
        }
        DragMode::Drawing { start } => {
            if let Some(size) = state.canvas_size {
                let current = state.viewport.to_image(position, size);
                state.preview = Some(Rect::from_corners(*start, current));
            }
        }
        DragMode::Moving { target_id, base, origin } => {
            if let Some(size) = state.canvas_size {
                let (dx, dy) = ((position.x - origin.x) / zoom, (position.y - origin.y) / zoom);
                let rect = move_rect(base, dx, dy, size);
                intents.push(EditorIntent::Update { id: target_id.clone(), rect });
            }
        }
        DragMode::Resizing { corner, target_id, base, origin } => {
            if let Some(size) = state.canvas_size {
                let (dx, dy) = ((position.x - origin.x) / zoom, (position.y - origin.y) / zoom);
                let rect = resize_rect(*corner, base, dx, dy, size);
                intents.push(EditorIntent::Update { id: target_id.clone(), rect });
            }
        }
    }
}

fn pointer_up(state: &mut EditorState, intents: &mut Vec<EditorIntent>) {
    let drag = std::mem::take(&mut state.drag);
    let preview = state.preview.take();
    let Some(canvas_id) = state.canvas_id.clone() else {
        return;
    };

    match drag {
        DragMode::Drawing { .. } => {
            let min = state.config.min_region_size;
            if let Some(rect) = preview.filter(|rect| rect.w > min && rect.h > min) {
                intents.push(EditorIntent::Create { canvas_id, rect });
            }
        }
        DragMode::Moving { .. } | DragMode::Resizing { .. } => {
            intents.push(EditorIntent::GestureEnded { canvas_id });
        }
        DragMode::Idle | DragMode::Panning { .. } => {}
    }
}

//! IIIF annotation core
//!
//! Manifest parsing, the rectangle editor, OCR import and the serializer that
//! writes annotations back into IIIF Presentation v3 JSON.

pub mod annotation;
pub mod editor;
pub mod export;
pub mod manifest;
pub mod manipulation;
pub mod ocr;
pub mod save_scheduler;
pub mod session;
pub mod target;
pub mod viewport;

pub use annotation::AnnotationIdGenerator;
pub use editor::{reduce, DragMode, EditorEvent, EditorIntent, EditorState};
pub use export::{
    build_annotation_page, build_annotation_pages, build_manifest_with_annotations,
    to_export_json, EXPORT_FILE_NAME, EXPORT_MEDIA_TYPE, PRESENTATION_CONTEXT,
};
pub use manifest::{annotations_from_saved_page, parse_manifest, resolve_annotations, FormatError};
pub use manipulation::{corner_handles, move_rect, resize_rect, Corner, Handle, MIN_REGION_SIZE};
pub use ocr::{
    import_ocr, import_ocr_after, import_ocr_batch, match_canvas, BatchImport, OcrDocument, OcrImportError,
    TargetSize,
};
pub use save_scheduler::{CanvasSave, SaveScheduler, SaveSchedulerConfig};
pub use session::AnnotatorSession;
pub use target::{decode_target, encode_target, DecodedTarget};
pub use viewport::{EditorConfig, Viewport};

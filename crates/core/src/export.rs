//! Serialization of annotations back into IIIF Presentation v3 JSON

use crate::target::encode_target;
use iiif_model::{AnnotationData, AnnotationsByCanvas, ManifestState};
use serde_json::{json, Map, Value};

pub const PRESENTATION_CONTEXT: &str = "http://iiif.io/api/presentation/3/context.json";
pub const EXPORT_FILE_NAME: &str = "manifest-annotated.json";
pub const EXPORT_MEDIA_TYPE: &str = "application/ld+json";

/// Standalone annotation page, as stored per canvas.
pub fn build_annotation_page(annotations: &[AnnotationData]) -> Value {
    let mut page = Map::new();
    page.insert("@context".to_owned(), Value::from(PRESENTATION_CONTEXT));
    page.extend(page_fields(annotations));
    Value::Object(page)
}

/// Page nested inside a canvas; the manifest already carries the context.
fn embedded_page(annotations: &[AnnotationData]) -> Value {
    Value::Object(page_fields(annotations))
}

fn page_fields(annotations: &[AnnotationData]) -> Map<String, Value> {
    let mut page = Map::new();
    page.insert("id".to_owned(), Value::from(fresh_urn()));
    page.insert("type".to_owned(), Value::from("AnnotationPage"));
    page.insert("items".to_owned(), annotations.iter().map(annotation_item).collect());
    page
}

fn annotation_item(annotation: &AnnotationData) -> Value {
    let mut body = Map::new();
    body.insert("type".to_owned(), Value::from("TextualBody"));
    body.insert("value".to_owned(), Value::from(annotation.text.as_str()));
    body.insert("format".to_owned(), Value::from("text/plain"));
    if !annotation.language.is_empty() {
        body.insert("language".to_owned(), Value::from(annotation.language.as_str()));
    }

    json!({
        "id": fresh_urn(),
        "type": "Annotation",
        "motivation": "supplementing",
        "body": body,
        "target": encode_target(&annotation.canvas_id, &annotation.rect),
    })
}

/// Copy of `raw` where every canvas carries exactly one annotation page built
/// from `by_canvas`, or none when its list is empty. Items without a string
/// id pass through untouched.
pub fn build_manifest_with_annotations(raw: &Value, by_canvas: &AnnotationsByCanvas) -> Value {
    let mut manifest = raw.clone();
    let Some(items) = manifest.get_mut("items").and_then(Value::as_array_mut) else {
        return manifest;
    };

    for item in items.iter_mut() {
        let Some(canvas) = item.as_object_mut() else {
            continue;
        };
        let Some(canvas_id) = canvas.get("id").and_then(Value::as_str).map(str::to_owned) else {
            continue;
        };

        canvas.retain(|key, _| key != "annotations");
        match by_canvas.get(&canvas_id) {
            Some(annotations) if !annotations.is_empty() => {
                canvas.insert("annotations".to_owned(), Value::Array(vec![embedded_page(annotations)]));
            }
            _ => {}
        }
    }

    manifest
}

/// One standalone page per canvas that has annotations, keyed by canvas index.
pub fn build_annotation_pages(manifest: &ManifestState, by_canvas: &AnnotationsByCanvas) -> Vec<(usize, Value)> {
    manifest
        .canvases
        .iter()
        .enumerate()
        .filter_map(|(index, canvas)| {
            let annotations = by_canvas.get(&canvas.id).filter(|list| !list.is_empty())?;
            Some((index, build_annotation_page(annotations)))
        })
        .collect()
}

/// UTF-8 JSON, two-space indented.
pub fn to_export_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn fresh_urn() -> String {
    format!("urn:uuid:{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::parse_manifest;
    use iiif_model::{CanvasInfo, Rect};

    fn annotation(canvas: &str, text: &str, language: &str) -> AnnotationData {
        AnnotationData::new("a", canvas, Rect::new(10.4, 20.5, 30.0, 40.0))
            .with_text(text)
            .with_language(language)
    }

    fn raw_manifest() -> Value {
        json!({
            "@context": PRESENTATION_CONTEXT,
            "id": "m",
            "type": "Manifest",
            "items": [
                {
                    "id": "c1",
                    "type": "Canvas",
                    "annotations": [{ "id": "old", "type": "AnnotationPage", "items": [] }]
                },
                { "id": "c2", "type": "Canvas", "annotations": [{ "id": "stale" }] },
                { "type": "Canvas", "annotations": ["untouched"] },
                "not an object"
            ]
        })
    }

    #[test]
    fn page_items_carry_textual_bodies_and_targets() {
        let page = build_annotation_page(&[annotation("c1", "文字", "ja"), annotation("c1", "x", "")]);

        assert_eq!(page["@context"], PRESENTATION_CONTEXT);
        assert_eq!(page["type"], "AnnotationPage");
        assert!(page["id"].as_str().is_some_and(|id| id.starts_with("urn:uuid:")));

        let first = &page["items"][0];
        assert_eq!(first["motivation"], "supplementing");
        assert_eq!(first["body"], json!({ "type": "TextualBody", "value": "文字", "format": "text/plain", "language": "ja" }));
        assert_eq!(first["target"], "c1#xywh=10,21,30,40");

        assert!(page["items"][1]["body"].get("language").is_none());
        assert_ne!(first["id"], page["items"][1]["id"]);
    }

    #[test]
    fn context_leads_the_standalone_page() {
        let page = build_annotation_page(&[]);
        let keys: Vec<&str> = page.as_object().map(|m| m.keys().map(String::as_str).collect()).unwrap_or_default();
        assert_eq!(keys, vec!["@context", "id", "type", "items"]);
    }

    #[test]
    fn empty_lists_remove_existing_pages() {
        let raw = raw_manifest();
        let mut by_canvas = AnnotationsByCanvas::new();
        by_canvas.insert("c1".to_owned(), vec![annotation("c1", "kept", "en")]);
        by_canvas.insert("c2".to_owned(), Vec::new());

        let exported = build_manifest_with_annotations(&raw, &by_canvas);
        let pages = exported["items"][0]["annotations"].as_array().expect("c1 has a page");
        assert_eq!(pages.len(), 1);
        assert_ne!(pages[0]["id"], "old");
        assert!(pages[0].get("@context").is_none());
        assert_eq!(pages[0]["items"][0]["body"]["value"], "kept");

        assert!(exported["items"][1].get("annotations").is_none());
        assert_eq!(exported["items"][2], raw["items"][2]);
        assert_eq!(exported["items"][3], "not an object");

        // Input untouched.
        assert_eq!(raw["items"][0]["annotations"][0]["id"], "old");
    }

    #[test]
    fn exported_manifest_parses_back_to_same_regions() {
        let raw = raw_manifest();
        let mut by_canvas = AnnotationsByCanvas::new();
        by_canvas.insert(
            "c1".to_owned(),
            vec![AnnotationData::new("x", "c1", Rect::new(1.0, 2.0, 30.0, 40.0)).with_text("t").with_language("en")],
        );

        let exported = build_manifest_with_annotations(&raw, &by_canvas);
        let trimmed = json!({ "type": "Manifest", "items": [exported["items"][0].clone()] });
        let state = parse_manifest(&trimmed).expect("export should parse");
        let back = &state.canvases[0].existing_annotations[0];
        assert_eq!(back.rect, Rect::new(1.0, 2.0, 30.0, 40.0));
        assert_eq!(back.text, "t");
        assert_eq!(back.language, "en");
    }

    #[test]
    fn per_canvas_pages_skip_empty_canvases() {
        let manifest = ManifestState {
            id: None,
            label: "m".to_owned(),
            canvases: vec![CanvasInfo::new("c1", "1"), CanvasInfo::new("c2", "2")],
        };
        let mut by_canvas = AnnotationsByCanvas::new();
        by_canvas.insert("c2".to_owned(), vec![annotation("c2", "t", "")]);

        let pages = build_annotation_pages(&manifest, &by_canvas);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].0, 1);
    }

    #[test]
    fn export_json_is_two_space_indented() {
        let text = to_export_json(&json!({ "a": { "b": 1 } })).expect("serializable");
        assert_eq!(text, "{\n  \"a\": {\n    \"b\": 1\n  }\n}");
    }
}

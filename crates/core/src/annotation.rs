//! Edits on a canvas's annotation list

use iiif_model::{AnnotationData, Rect};

/// Hands out time-based annotation ids that strictly increase even when
/// several are requested within the same millisecond.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIdGenerator {
    last: i64,
}

impl AnnotationIdGenerator {
    /// Returns the id and the timestamp it encodes.
    pub fn next_id(&mut self, now_millis: i64) -> (String, i64) {
        let stamp = now_millis.max(self.last + 1);
        self.last = stamp;
        (stamp.to_string(), stamp)
    }
}

pub fn find<'a>(annotations: &'a [AnnotationData], id: &str) -> Option<&'a AnnotationData> {
    annotations.iter().find(|a| a.id == id)
}

fn find_mut<'a>(annotations: &'a mut [AnnotationData], id: &str) -> Option<&'a mut AnnotationData> {
    annotations.iter_mut().find(|a| a.id == id)
}

/// Returns `false` when no annotation has that id.
pub fn set_rect(annotations: &mut [AnnotationData], id: &str, rect: Rect) -> bool {
    find_mut(annotations, id).map(|a| a.rect = rect).is_some()
}

pub fn set_text(annotations: &mut [AnnotationData], id: &str, text: &str) -> bool {
    find_mut(annotations, id).map(|a| a.text = text.to_owned()).is_some()
}

pub fn set_language(annotations: &mut [AnnotationData], id: &str, language: &str) -> bool {
    find_mut(annotations, id).map(|a| a.language = language.to_owned()).is_some()
}

pub fn remove(annotations: &mut Vec<AnnotationData>, id: &str) -> Option<AnnotationData> {
    let index = annotations.iter().position(|a| a.id == id)?;
    Some(annotations.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<AnnotationData> {
        vec![
            AnnotationData::new("a", "c1", Rect::new(0.0, 0.0, 10.0, 10.0)),
            AnnotationData::new("b", "c1", Rect::new(20.0, 20.0, 10.0, 10.0)),
        ]
    }

    #[test]
    fn ids_stay_monotonic_within_one_millisecond() {
        let mut ids = AnnotationIdGenerator::default();
        assert_eq!(ids.next_id(1_000), ("1000".to_owned(), 1_000));
        assert_eq!(ids.next_id(1_000), ("1001".to_owned(), 1_001));
        assert_eq!(ids.next_id(999), ("1002".to_owned(), 1_002));
        assert_eq!(ids.next_id(5_000).1, 5_000);
    }

    #[test]
    fn edits_target_a_single_annotation() {
        let mut list = sample();
        assert!(set_rect(&mut list, "b", Rect::new(1.0, 2.0, 30.0, 40.0)));
        assert!(set_text(&mut list, "a", "いろは"));
        assert!(set_language(&mut list, "a", "en"));
        assert!(!set_text(&mut list, "missing", "x"));

        assert_eq!(list[1].rect, Rect::new(1.0, 2.0, 30.0, 40.0));
        assert_eq!(find(&list, "a").map(|a| a.text.as_str()), Some("いろは"));
        assert_eq!(list[0].language, "en");
    }

    #[test]
    fn remove_keeps_remaining_order() {
        let mut list = sample();
        list.push(AnnotationData::new("c", "c1", Rect::new(5.0, 5.0, 10.0, 10.0)));

        let removed = remove(&mut list, "b").expect("b exists");
        assert_eq!(removed.id, "b");
        assert_eq!(list.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(remove(&mut list, "b").is_none());
    }
}

//! IIIF media-fragment targets
//!
//! Maps a canvas rectangle to and from `<canvasURI>#xywh=<x>,<y>,<w>,<h>`.

use iiif_model::Rect;

/// Separator between the canvas URI and the rectangle fragment.
pub const XYWH_SEPARATOR: &str = "#xywh=";

/// A successfully decoded target.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTarget {
    pub canvas_id: String,
    pub rect: Rect,
}

/// Encode a rectangle as a fragment target.
///
/// Each component is rounded on its own (half away from zero), so
/// `x + w` may drift from the rounded right edge by one pixel.
pub fn encode_target(canvas_id: &str, rect: &Rect) -> String {
    format!(
        "{canvas_id}{XYWH_SEPARATOR}{},{},{},{}",
        round_component(rect.x),
        round_component(rect.y),
        round_component(rect.w),
        round_component(rect.h)
    )
}

/// Decode a fragment target. Returns `None` for anything unusable.
pub fn decode_target(target: &str) -> Option<DecodedTarget> {
    let (canvas_id, fragment) = target.split_once(XYWH_SEPARATOR)?;
    if canvas_id.is_empty() || fragment.is_empty() {
        return None;
    }

    let mut components = [0.0_f64; 4];
    let mut parts = fragment.split(',');
    for slot in components.iter_mut() {
        *slot = parse_component(parts.next()?)?;
    }
    if parts.next().is_some() {
        return None;
    }

    let [x, y, w, h] = components;
    Some(DecodedTarget { canvas_id: canvas_id.to_owned(), rect: Rect { x, y, w, h } })
}

fn round_component(value: f64) -> i64 {
    value.round() as i64
}

fn parse_component(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: &str = "https://example.org/iiif/book1/canvas/p1";

    #[test]
    fn integer_rects_round_trip() {
        for (x, y, w, h) in [(0, 0, 5, 5), (12, 340, 56, 78), (1999, 2999, 1, 1)] {
            let rect = Rect::new(x as f64, y as f64, w as f64, h as f64);
            let encoded = encode_target(CANVAS, &rect);
            let decoded = decode_target(&encoded).expect("encoded target should decode");
            assert_eq!(decoded.canvas_id, CANVAS);
            assert_eq!(decoded.rect, rect);
        }
    }

    #[test]
    fn components_round_half_away_from_zero_independently() {
        let encoded = encode_target("c1", &Rect::new(1.4, 2.6, 3.5, 4.5));
        assert_eq!(encoded, "c1#xywh=1,3,4,5");
    }

    #[test]
    fn decode_accepts_fractional_components() {
        let decoded = decode_target("c1#xywh=10.5,20,30.25,40").expect("should decode");
        assert_eq!(decoded.rect, Rect::new(10.5, 20.0, 30.25, 40.0));
    }

    #[test]
    fn decode_rejects_missing_parts() {
        assert_eq!(decode_target("c1"), None);
        assert_eq!(decode_target("#xywh=1,2,3,4"), None);
        assert_eq!(decode_target("c1#xywh="), None);
    }

    #[test]
    fn decode_rejects_bad_components() {
        assert_eq!(decode_target("c1#xywh=1,2,3"), None);
        assert_eq!(decode_target("c1#xywh=1,2,3,4,5"), None);
        assert_eq!(decode_target("c1#xywh=1,two,3,4"), None);
        assert_eq!(decode_target("c1#xywh=1,,3,4"), None);
        assert_eq!(decode_target("c1#xywh=1,2,NaN,4"), None);
        assert_eq!(decode_target("c1#xywh=pixel:1,2,3,4"), None);
    }
}

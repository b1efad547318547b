use crate::interval::Interval;
use crate::layer::{Layer, SegmentTag};

/// Asserts the structural invariants of `layer` and every layer below it.
pub fn check(layer: &Layer) {
    let text = layer.text();
    let structure = layer.structure();
    let n = layer.length();
    assert_eq!(n, text.len(), "layer length disagrees with its text");

    let (Some(head), Some(tail)) = (structure.first(), structure.last()) else {
        panic!("layer {} has no sentinels", layer.id());
    };
    assert!(
        head.kind == SegmentTag::Anchor && head.span == Interval::point(0),
        "head sentinel is not a zero-width anchor at 0: {head:?}"
    );
    assert!(
        tail.kind == SegmentTag::Anchor && tail.span == Interval::point(n),
        "tail sentinel is not a zero-width anchor at {n}: {tail:?}"
    );

    let mut expected_start = 0;
    let mut previous_below: Option<Interval> = None;
    for view in &structure {
        assert_eq!(
            view.span.start, expected_start,
            "segment does not start where its predecessor ends: {view:?}"
        );
        assert_eq!(
            &text[view.span.as_range()],
            view.text,
            "segment text disagrees with layer text: {view:?}"
        );
        match view.kind {
            SegmentTag::Anchor => assert!(view.span.is_empty(), "anchor with width: {view:?}"),
            SegmentTag::Base => assert!(!view.text.is_empty(), "empty base segment: {view:?}"),
            SegmentTag::Oblique => {
                let below = view.underlying.unwrap_or_else(|| {
                    panic!("oblique segment without underlying span: {view:?}")
                });
                assert!(below.start <= below.end, "inverted oblique segment: {view:?}");
                if let Some(previous) = previous_below {
                    assert!(
                        previous.end <= below.start,
                        "oblique segments out of order: {previous:?} then {below:?}"
                    );
                }
                previous_below = Some(below);
            }
        }
        expected_start = view.span.end;
    }

    if let Some(underlying) = layer.underlying() {
        check(underlying);
    }
}

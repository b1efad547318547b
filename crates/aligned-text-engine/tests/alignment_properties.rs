use aligned_text_engine::{Edit, Interval, Layer, snapshot};
use pretty_assertions::assert_eq;
use rstest::rstest;

/// Small deterministic generator so failures reproduce from the seed alone.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % (bound as u64 + 1)) as usize
    }
}

const SAMPLE: &str = "The quick brown fox, having jumped over the lazy dog, rests.";

fn random_edits(layer: &mut Layer, rng: &mut Lcg, rounds: usize) {
    for _ in 0..rounds {
        let len = layer.length();
        let start = rng.below(len);
        let end = start + rng.below(len - start).min(6);
        match rng.next() % 3 {
            0 => layer.insert(start, "<ins>").unwrap(),
            1 => layer.delete(start, end).unwrap(),
            _ => layer.replace(start, end, "~").unwrap(),
        }
    }
}

fn all_intervals(len: usize) -> impl Iterator<Item = Interval> {
    (0..=len).flat_map(move |start| (start..=len).map(move |end| Interval::new(start, end)))
}

/// End-to-end walk through the comma deletion.
#[test]
fn hello_world_end_to_end() {
    let base = Layer::new("Hello, World!");
    let mut l1 = Layer::derive_from(&base);
    l1.replace(5, 6, "").unwrap();

    assert_eq!(&*l1.text(), "Hello World!");
    assert_eq!(l1.resolve(Interval::new(0, 5)), Ok(Interval::new(0, 5)));
    assert_eq!(l1.resolve(Interval::new(5, 11)), Ok(Interval::new(6, 12)));
    assert_eq!(
        l1.inverse_resolve(Interval::new(5, 6)),
        Ok(Interval::point(5))
    );
    snapshot::invariants(&l1);
}

#[test]
fn untouched_layers_resolve_to_themselves() {
    let base = Layer::new(SAMPLE);
    let derived = Layer::derive_from(&base);
    for interval in all_intervals(SAMPLE.len()).step_by(7) {
        assert_eq!(derived.resolve(interval), Ok(interval));
        assert_eq!(derived.inverse_resolve(interval), Ok(interval));
    }
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(42)]
#[case(1234)]
#[case(987654321)]
fn random_edits_keep_structure_consistent(#[case] seed: u64) {
    let base = Layer::new(SAMPLE);
    let mut derived = Layer::derive_from(&base);
    let mut rng = Lcg(seed);
    random_edits(&mut derived, &mut rng, 12);
    snapshot::invariants(&derived);

    let total: usize = derived.segments().iter().map(|view| view.span.len()).sum();
    assert_eq!(total, derived.length());
}

#[rstest]
#[case(3)]
#[case(17)]
#[case(2024)]
fn resolution_never_inverts(#[case] seed: u64) {
    let base = Layer::new(SAMPLE);
    let mut derived = Layer::derive_from(&base);
    let mut rng = Lcg(seed);
    random_edits(&mut derived, &mut rng, 8);

    for interval in all_intervals(derived.length()) {
        let below = derived.resolve(interval).unwrap();
        assert!(below.start <= below.end, "{interval} resolved to {below}");
        assert!(below.end <= base.length());
    }
    for interval in all_intervals(base.length()) {
        let above = derived.inverse_resolve(interval).unwrap();
        assert!(above.start <= above.end, "{interval} mapped up to {above}");
        assert!(above.end <= derived.length());
    }
}

#[rstest]
#[case(5)]
#[case(99)]
fn text_carried_through_views_resolves_exactly(#[case] seed: u64) {
    let base = Layer::new(SAMPLE);
    let mut derived = Layer::derive_from(&base);
    let mut rng = Lcg(seed);
    random_edits(&mut derived, &mut rng, 6);

    for view in derived.segments() {
        let Some(below) = view.underlying else {
            continue;
        };
        assert_eq!(derived.resolve(view.span), Ok(below));
        assert_eq!(
            base.text_range(below).unwrap(),
            derived.text_range(view.span).unwrap()
        );
    }
}

#[rstest]
#[case(0)]
#[case(4)]
#[case(13)]
#[case(SAMPLE.len())]
fn anchors_are_idempotent(#[case] pos: usize) {
    let mut base = Layer::new(SAMPLE);
    let first = base.get_anchor(pos).unwrap();
    let count = base.structure().len();
    let second = base.get_anchor(pos).unwrap();
    assert_eq!(first, second);
    assert_eq!(base.structure().len(), count);
    assert_eq!(base.anchor_position(&first), Ok(pos));
    assert_eq!(&*base.text(), SAMPLE);
}

#[test]
fn hyphenation_fix_stays_aligned_after_later_edits() {
    let base = Layer::new("a long hyphen- ated word");
    let mut dehyphenated = Layer::derive_from(&base);
    dehyphenated.delete(13, 15).unwrap();
    assert_eq!(&*dehyphenated.text(), "a long hyphenated word");

    let word = Interval::new(7, 17);
    assert_eq!(dehyphenated.resolve(word), Ok(Interval::new(7, 19)));

    // A later insertion in front shifts the word but not its origin.
    dehyphenated.insert(0, ">> ").unwrap();
    let shifted = Interval::new(10, 20);
    assert_eq!(dehyphenated.text_range(shifted).unwrap(), "hyphenated");
    assert_eq!(dehyphenated.resolve(shifted), Ok(Interval::new(7, 19)));
    snapshot::invariants(&dehyphenated);
}

#[test]
fn edits_to_the_original_show_through_every_view() {
    let mut base = Layer::new("one two three");
    let mut first = Layer::derive_from(&base);
    first.replace(4, 7, "2").unwrap();
    let second = Layer::derive_from(&first);
    assert_eq!(&*second.text(), "one 2 three");

    base.insert(0, "zero ").unwrap();
    assert_eq!(&*first.text(), "zero one 2 three");
    assert_eq!(&*second.text(), "zero one 2 three");
    assert_eq!(
        second.resolve_to_base(Interval::new(11, 16)),
        Ok(Interval::new(13, 18))
    );
    snapshot::invariants(&second);
}

#[test]
fn regex_pipeline_over_several_layers() {
    let base = Layer::new("Tom &amp; Jerry,   in   Paris");
    let unescaped = base
        .rewrite(Edit::from_regex(
            &base.text(),
            &regex::Regex::new("&amp;").unwrap(),
            "&",
        ))
        .unwrap();
    let squeezed = unescaped
        .rewrite(Edit::from_regex(
            &unescaped.text(),
            &regex::Regex::new(r"\s+").unwrap(),
            " ",
        ))
        .unwrap();
    assert_eq!(&*squeezed.text(), "Tom & Jerry, in Paris");

    let paris = Interval::new(16, 21);
    assert_eq!(squeezed.text_range(paris).unwrap(), "Paris");
    let original = squeezed.resolve_to_base(paris).unwrap();
    assert_eq!(base.text_range(original).unwrap(), "Paris");

    let back = squeezed.inverse_resolve_from(&base, original).unwrap();
    assert_eq!(back, paris);
}

// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use aligned_text_engine::{Edit, Layer};

#[allow(dead_code)]
pub fn generate_text(size: usize) -> String {
    let base = "Some  text with &amp; entities, hyphen- ated words\tand   runs of whitespace.\n";
    base.repeat(size)
}

/// A base layer plus one derived layer with every whitespace run squeezed.
#[allow(dead_code)]
pub fn squeezed_stack(size: usize) -> (Layer, Layer) {
    let base = Layer::new(generate_text(size));
    let re = regex::Regex::new(r"\s+").unwrap();
    let edits = Edit::from_regex(&base.text(), &re, " ");
    let derived = base.rewrite(edits).unwrap();
    (base, derived)
}

//! Value shape signatures.
//!
//! A signature replaces every run of ASCII digits with `#` and every run of
//! ASCII letters with `A`; all other characters are kept as they are. The
//! generated SQL applies the same two rewrites with `regexp_replace`, so the
//! in-process function and the warehouse agree on every signature.

/// Regex matched by digit runs, shared with the SQL rendering.
pub const DIGIT_RUN: &str = "[0-9]+";

/// Regex matched by letter runs, shared with the SQL rendering.
pub const LETTER_RUN: &str = "[A-Za-z]+";

/// Computes the shape signature of a value.
///
/// ```rust
/// use column_lens::analyzers::patterns::pattern_signature;
///
/// assert_eq!(pattern_signature("A1"), "A#");
/// assert_eq!(pattern_signature("ORD-2024-00017"), "A-#-#");
/// assert_eq!(pattern_signature("jane.doe@example.com"), "A.A@A.A");
/// ```
pub fn pattern_signature(value: &str) -> String {
    let mut signature = String::with_capacity(value.len());
    let mut previous: Option<char> = None;

    for c in value.chars() {
        let mapped = if c.is_ascii_digit() {
            '#'
        } else if c.is_ascii_alphabetic() {
            'A'
        } else {
            previous = None;
            signature.push(c);
            continue;
        };
        if previous != Some(mapped) {
            signature.push(mapped);
        }
        previous = Some(mapped);
    }

    signature
}

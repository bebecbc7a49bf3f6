//! Whole-word identifier renaming.
//!
//! A tiny tokenizer instead of regex word boundaries: identifier runs
//! (`[A-Za-z0-9_]+`) are looked up as whole tokens, everything else passes
//! through untouched. A name appearing as a substring of a longer
//! identifier is never corrupted.

/// Rewrites every identifier token for which `lookup` returns a
/// replacement. Non-identifier characters are copied verbatim.
pub fn rename_words<'r>(input: &str, lookup: impl Fn(&str) -> Option<&'r str>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut token = String::new();

    let flush = |token: &mut String, out: &mut String, lookup: &dyn Fn(&str) -> Option<&'r str>| {
        if !token.is_empty() {
            match lookup(token) {
                Some(replacement) => out.push_str(replacement),
                None => out.push_str(token),
            }
            token.clear();
        }
    };

    for ch in input.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            token.push(ch);
        } else {
            flush(&mut token, &mut out, &lookup);
            out.push(ch);
        }
    }
    flush(&mut token, &mut out, &lookup);
    out
}

//! ANSI-aware text measurement for column layout.
//!
//! Presenters align labels by their visible width, so styled text has to be
//! measured with its escape sequences removed and padded or truncated
//! without disturbing them.

use std::sync::LazyLock;

use regex::Regex;

static ESCAPE_SEQUENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\x9B|\x1B\[)[0-?]*[ -/]*[@-~]")
        .expect("escape sequence pattern is valid")
});

/// Remove all ANSI escape sequences from `text`.
pub fn strip(text: &str) -> String {
    ESCAPE_SEQUENCE.replace_all(text, "").into_owned()
}

/// The character length of `text` with all escape sequences removed.
pub fn visible_len(text: &str) -> usize {
    strip(text).chars().count()
}

/// Pad the right side of `text` with `pad` up to `width`, as measured by
/// [`visible_len`].
pub fn pad_right_with(text: &str, width: usize, pad: char) -> String {
    let len = visible_len(text);
    if width <= len {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + (width - len));
    out.push_str(text);
    out.extend(std::iter::repeat(pad).take(width - len));
    out
}

/// Pad the right side of `text` with spaces up to `width`, as measured by
/// [`visible_len`].
pub fn pad_right(text: &str, width: usize) -> String {
    pad_right_with(text, width, ' ')
}

/// Truncate `text` to at most `max` visible characters, preserving every
/// escape sequence.
pub fn truncate(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if visible_len(text) <= max {
        return text.to_string();
    }
    let mut remaining = max;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in ESCAPE_SEQUENCE.find_iter(text) {
        take_visible(&mut out, &text[last..found.start()], &mut remaining);
        out.push_str(found.as_str());
        last = found.end();
    }
    take_visible(&mut out, &text[last..], &mut remaining);
    out
}

fn take_visible(out: &mut String, chunk: &str, remaining: &mut usize) {
    for ch in chunk.chars() {
        if *remaining == 0 {
            return;
        }
        out.push(ch);
        *remaining -= 1;
    }
}

//! Deterministic text helpers.
//!
//! Everything here is pure: no network, no file system, no failure modes.

use crate::enrichment::UNREADABLE_SENTINEL;

/// Maximum consecutive newlines kept by [`apply_local_corrections`].
const MAX_CONSECUTIVE_NEWLINES: usize = 2;

/// Local fallback correction for OCR text.
///
/// Normalizes CRLF to LF, collapses runs of spaces and tabs into a single
/// space and collapses three or more consecutive newlines into exactly two.
/// Lines holding only spaces or tabs count towards a newline run; blanks on
/// a dropped line are dropped with it.
///
/// ```
/// use lectern_core::apply_local_corrections;
/// assert_eq!(apply_local_corrections("a  b\n\n\nc"), "a b\n\nc");
/// ```
pub fn apply_local_corrections(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newline_run = 0usize;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => continue,
            ' ' | '\t' => {
                pending_space = true;
            }
            '\n' | '\r' => {
                newline_run += 1;
                if newline_run <= MAX_CONSECUTIVE_NEWLINES {
                    pending_space_flush(&mut out, &mut pending_space);
                    out.push('\n');
                } else {
                    // Blank-line padding goes with the dropped newline.
                    pending_space = false;
                }
            }
            other => {
                pending_space_flush(&mut out, &mut pending_space);
                newline_run = 0;
                out.push(other);
            }
        }
    }
    pending_space_flush(&mut out, &mut pending_space);
    out
}

fn pending_space_flush(out: &mut String, pending: &mut bool) {
    if *pending {
        out.push(' ');
        *pending = false;
    }
}

/// Whether an external response is the unreadable-text sentinel.
///
/// Surrounding whitespace is ignored and the comparison is case-insensitive.
pub fn is_unreadable_sentinel(response: &str) -> bool {
    response.trim().eq_ignore_ascii_case(UNREADABLE_SENTINEL)
}

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Applying the correction twice is the same as applying it once.
        #[test]
        fn prop_local_corrections_idempotent(text in "[a-z \t\n]{0,80}") {
            let once = apply_local_corrections(&text);
            prop_assert_eq!(apply_local_corrections(&once), once.clone());
        }

        /// Output never contains a double space or three newlines in a row.
        #[test]
        fn prop_local_corrections_collapse(text in "[a-z \n]{0,80}") {
            let out = apply_local_corrections(&text);
            prop_assert!(!out.contains("  "));
            prop_assert!(!out.contains("\n\n\n"));
        }

        /// Lines holding only blanks between newlines collapse and stay stable.
        #[test]
        fn prop_local_corrections_blank_lines(text in "([a-z]{0,3}[ \t]{0,2}\n){0,10}") {
            let once = apply_local_corrections(&text);
            prop_assert!(!once.contains("  "));
            prop_assert!(!once.contains("\n\n\n"));
            prop_assert_eq!(apply_local_corrections(&once), once.clone());
        }

        /// Truncation never exceeds the character budget.
        #[test]
        fn prop_truncate_chars_bounded(text in ".{0,64}", max in 0usize..80) {
            let out = truncate_chars(&text, max);
            prop_assert!(out.chars().count() <= max);
            prop_assert!(text.starts_with(out));
        }
    }
}

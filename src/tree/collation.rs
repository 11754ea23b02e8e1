//! Locale-style name ordering.
//!
//! Names are compared in three passes, the way a root-locale collator does:
//! base letters first (accents and case ignored), then accents, then case with
//! lower case sorting before upper case. Raw code point order breaks any
//! remaining tie so the result is a total order.

use std::cmp::Ordering;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

pub fn locale_compare(a: &str, b: &str) -> Ordering {
    primary_key(a)
        .cmp(&primary_key(b))
        .then_with(|| secondary_key(a).cmp(&secondary_key(b)))
        .then_with(|| tertiary_key(a).cmp(&tertiary_key(b)))
        .then_with(|| a.cmp(b))
}

fn primary_key(name: &str) -> Vec<char> {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

fn secondary_key(name: &str) -> Vec<char> {
    name.nfd().flat_map(char::to_lowercase).collect()
}

fn tertiary_key(name: &str) -> Vec<bool> {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(char::is_uppercase)
        .collect()
}

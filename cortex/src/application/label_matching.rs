// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Label normalisation and order-independent fuzzy scoring

use std::collections::BTreeSet;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-case, strip diacritics, turn punctuation into spaces and collapse
/// whitespace. `"Café, Inc."` becomes `"cafe inc"`.
pub fn normalize_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_was_space = true;

    for ch in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// File-name-safe form of a label: normalised tokens joined by `_`.
pub fn slugify(label: &str) -> String {
    let slug = normalize_label(label).replace(' ', "_");
    if slug.is_empty() {
        "unlabeled".to_string()
    } else {
        slug
    }
}

/// Distinct normalised tokens, sorted
pub fn tokens(input: &str) -> BTreeSet<String> {
    normalize_label(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Labels with no letters or digits (`"???"`, emoji) normalise to nothing;
/// those only ever match the same raw text, ignoring case and padding.
fn same_symbolic_label(a: &str, b: &str) -> bool {
    normalize_label(a).is_empty()
        && normalize_label(b).is_empty()
        && !a.trim().is_empty()
        && a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Whether two labels share a token or one normalised form contains the other.
pub fn labels_overlap(query: &str, candidate: &str) -> bool {
    let q = normalize_label(query);
    let c = normalize_label(candidate);
    if q.is_empty() || c.is_empty() {
        return same_symbolic_label(query, candidate);
    }
    if c.contains(&q) || q.contains(&c) {
        return true;
    }
    let qt = tokens(&q);
    tokens(&c).iter().any(|t| qt.contains(t))
}

/// Indel similarity of two strings in 0.0..=100.0, based on the longest
/// common subsequence over chars.
fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    200.0 * lcs as f64 / total as f64
}

/// Token-set ratio (0-100) of two labels after normalisation.
///
/// The shared tokens are compared against each side's shared-plus-remainder
/// string and the two remainders against each other; the best of the three
/// wins. Token order never matters and identical normalised labels score 100.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return if same_symbolic_label(a, b) { 100 } else { 0 };
    }

    let join = |set: Vec<&String>| {
        set.into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let with_base = |base: &str, rest: &str| match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{} {}", base, rest),
    };

    let shared = join(ta.intersection(&tb).collect());
    let only_a = join(ta.difference(&tb).collect());
    let only_b = join(tb.difference(&ta).collect());

    let combined_a = with_base(&shared, &only_a);
    let combined_b = with_base(&shared, &only_b);

    let mut best = indel_ratio(&combined_a, &combined_b);
    if !shared.is_empty() {
        best = best
            .max(indel_ratio(&shared, &combined_a))
            .max(indel_ratio(&shared, &combined_b));
    }

    best.round().clamp(0.0, 100.0) as u8
}

//! Keyword cleanup: turn free-form model output into topic names.
//!
//! Text-generation models give no structural guarantee about their answer
//! format. What comes back is anything from `"physics, chemistry."` to
//! `"- Machine Learning 2\n- Statistics"`. This module applies a fixed,
//! lossy sequence of string rules to extract usable topic tokens. It is not
//! a parser; unusual answers simply produce unusual topics.
//!
//! Two stages:
//!
//! 1. [`split_keywords`] — raw answer → candidate tokens
//! 2. [`clean_keywords`] — candidate tokens → topic names
//!
//! [`clean_keywords`] is idempotent: feeding its output back in returns the
//! same list. Every rule below was chosen so that no rule can produce input
//! that an earlier rule would change again.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Token used when the answer contains no keywords at all.
pub const NO_KEYWORDS: &str = "no-keywords-available";

/// Tokens that describe every book and therefore carry no topic.
const BOILERPLATE: [&str; 4] = ["Book", "Books", "Science", "Sciences"];

// ── Stage 1: split ───────────────────────────────────────────────────────────

/// Split a raw model answer into candidate keyword tokens.
///
/// Rules (applied in order):
/// 1. Periods become commas, then split on commas
/// 2. Drop a single trailing empty token (answers ending in `.` or `,`)
/// 3. A lone token is split again on `" - "` (dash-separated lists)
/// 4. No tokens at all yields [`NO_KEYWORDS`]
/// 5. Trim every token
/// 6. Drop tokens containing `:` (model preambles like "Keywords: ...")
pub fn split_keywords(answer: &str) -> Vec<String> {
    let replaced = answer.replace('.', ",");
    let mut tokens: Vec<String> = replaced.split(',').map(str::to_string).collect();

    if tokens.last().is_some_and(|t| t.is_empty()) {
        tokens.pop();
    }

    if tokens.len() == 1 {
        tokens = tokens[0].split(" - ").map(str::to_string).collect();
    } else if tokens.is_empty() {
        tokens = vec![NO_KEYWORDS.to_string()];
    }

    tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.contains(':'))
        .collect()
}

// ── Stage 2: clean ───────────────────────────────────────────────────────────

/// Trailing whitespace-separated digit groups: `"Calculus 2"`, `"Algebra 1 3"`.
static RE_DIGIT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)(?:\s+[0-9]+)+$").unwrap());

/// Clean candidate tokens into topic names.
///
/// Per token:
/// 1. Trim and title-case (`"machine learning"` → `"Machine Learning"`)
/// 2. Strip every leading `"- "` bullet
/// 3. Strip trailing digit groups (`"Calculus 2"` → `"Calculus"`)
/// 4. Drop empty and boilerplate tokens
///
/// Then de-duplicate, keeping the first occurrence.
pub fn clean_keywords<S: AsRef<str>>(keywords: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .filter_map(|k| clean_keyword(k.as_ref()))
        .filter(|k| seen.insert(k.clone()))
        .collect()
}

/// Clean a single token; `None` when nothing useful remains.
pub fn clean_keyword(keyword: &str) -> Option<String> {
    let mut s = title_case(keyword.trim());

    while let Some(rest) = s.strip_prefix("- ") {
        s = rest.trim_start().to_string();
    }

    if let Some(caps) = RE_DIGIT_SUFFIX.captures(&s) {
        s = caps[1].trim_end().to_string();
    }

    if s.is_empty() || BOILERPLATE.contains(&s.as_str()) {
        None
    } else {
        Some(s)
    }
}

/// Title-case with the same word boundaries as Python's `str.title`:
/// a letter is upper-cased when the previous character is not a letter,
/// lower-cased otherwise. A capital that expands to several characters
/// (`ß` → `SS`, `ﬁ` → `FI`) keeps only its first one upper-case.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if !c.is_alphabetic() {
            out.push(c);
            prev_is_letter = false;
            continue;
        }
        if prev_is_letter {
            out.extend(c.to_lowercase());
        } else {
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                out.push(first);
            }
            out.extend(upper.flat_map(char::to_lowercase));
        }
        // Lower-casing can emit combining marks (`İ` → `i̇`).
        prev_is_letter = out.chars().next_back().is_some_and(char::is_alphabetic);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_comma_list_with_trailing_period() {
        let got = split_keywords("physics, chemistry, biology.");
        assert_eq!(got, vec!["physics", "chemistry", "biology"]);
    }

    #[test]
    fn split_dash_list_when_single_token() {
        let got = split_keywords("Machine Learning - Statistics - Data Mining");
        assert_eq!(got, vec!["Machine Learning", "Statistics", "Data Mining"]);
    }

    #[test]
    fn split_empty_answer_yields_placeholder() {
        assert_eq!(split_keywords(""), vec![NO_KEYWORDS]);
    }

    #[test]
    fn split_drops_colon_tokens() {
        let got = split_keywords("Keywords: algebra, topology, geometry");
        assert_eq!(got, vec!["topology", "geometry"]);
    }

    #[test]
    fn title_case_matches_python_semantics() {
        assert_eq!(title_case("machine learning"), "Machine Learning");
        assert_eq!(title_case("SQL databases"), "Sql Databases");
        assert_eq!(title_case("no-keywords-available"), "No-Keywords-Available");
        assert_eq!(title_case("3d graphics"), "3D Graphics");
        assert_eq!(title_case("ßtraße"), "Sstraße");
        assert_eq!(title_case("ﬁnance"), "Finance");
    }

    #[test]
    fn clean_removes_boilerplate_and_bullets() {
        let got = clean_keywords(&["book", "- statistics", "Sciences", "", "- ", "science"]);
        assert_eq!(got, vec!["Statistics"]);
    }

    #[test]
    fn clean_strips_digit_suffixes() {
        let got = clean_keywords(&["calculus 2", "linear algebra 1 3", "2"]);
        assert_eq!(got, vec!["Calculus", "Linear Algebra", "2"]);
    }

    #[test]
    fn clean_drops_boilerplate_revealed_by_suffix_strip() {
        assert_eq!(clean_keyword("books 4"), None);
    }

    #[test]
    fn clean_deduplicates_preserving_order() {
        let got = clean_keywords(&["physics", "Chemistry", "PHYSICS", "chemistry 2"]);
        assert_eq!(got, vec!["Physics", "Chemistry"]);
    }

    #[test]
    fn clean_is_idempotent() {
        let inputs = [
            vec!["- - machine learning 2 3", "BOOK", "data  science", "x-ray 7"],
            vec!["  - statistics", "don't panic", "Ünïcode tëxt 12", "-  spaced"],
            vec!["5 5", "- 5", "Calculus", "calculus"],
            vec!["ßtraße", "ﬁnance 3", "aİbc"],
        ];
        for input in inputs {
            let once = clean_keywords(&input);
            let twice = clean_keywords(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn split_then_clean_full_answer() {
        let answer = "- Machine Learning 2 - Statistics - Books";
        let got = clean_keywords(&split_keywords(answer));
        assert_eq!(got, vec!["Machine Learning", "Statistics"]);
    }
}

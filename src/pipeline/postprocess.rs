//! Post-processing: deterministic cleanup of VLM answers.
//!
//! Even when asked for "the text only", models wrap answers in code fences,
//! quotes, bold markers or task tags (`<s_answer>…</s_answer>`), prefix them
//! with a label, or add a second line of commentary. These rules reduce an
//! answer to the bare value that goes into the catalog.
//!
//! ## Rule Order
//!
//! Fences and tags go first so the first-line rule sees real content; quote
//! stripping runs last because labels and bold markers sit outside quotes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply every cleanup rule to a raw VLM answer.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Strip markup tags
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Keep the first non-empty line
/// 5. Drop a leading `Title:` / `Publisher:` / `Answer:` label
/// 6. Strip surrounding bold markers and quotes
/// 7. Collapse internal whitespace and trim
pub fn clean_answer(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = strip_tags(&s);
    let s = remove_invisible_chars(&s);
    let s = first_line(&s);
    let s = strip_label(&s);
    let s = strip_wrapping(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n?(.*?)\n?```$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    }
}

// ── Rule 2: Strip markup tags ────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z_][^<>]*>").unwrap());

fn strip_tags(input: &str) -> String {
    RE_TAG.replace_all(input, " ").into_owned()
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: First non-empty line ─────────────────────────────────────────────

fn first_line(input: &str) -> String {
    input
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

// ── Rule 5: Leading label ────────────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\**\s*(?:the\s+)?(?:title|publisher|answer)\s*\**\s*:\s*\**\s*").unwrap()
});

fn strip_label(input: &str) -> String {
    RE_LABEL.replace(input, "").into_owned()
}

// ── Rule 6: Bold markers and quotes ──────────────────────────────────────────

const WRAPPERS: [(char, char); 6] = [
    ('"', '"'),
    ('\'', '\''),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
    ('`', '`'),
    ('«', '»'),
];

fn strip_wrapping(input: &str) -> String {
    let mut s = input.trim().trim_matches('*').trim();
    loop {
        let mut chars = s.chars();
        let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
            break;
        };
        if WRAPPERS.contains(&(first, last)) {
            s = s[first.len_utf8()..s.len() - last.len_utf8()].trim();
        } else {
            break;
        }
    }
    s.to_string()
}

// ── Rule 7: Whitespace ───────────────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

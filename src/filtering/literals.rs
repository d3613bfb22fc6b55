//! Tolerant extraction of data structures embedded in the server's pages.
//!
//! The game server inlines its state into script literals (`var hpmp = [...]`,
//! `var flist = [[...],[...]]`) and into `@`/`:`-delimited slot records. The
//! generator on the server side is not grammar-stable (escaping is
//! inconsistent between pages), so everything here is a tolerant scan, not a
//! strict parser. Malformed rows are dropped; a miss is `None`/empty, never an
//! error. Breaking the surrounding page render is the one unacceptable
//! outcome.

use aho_corasick::AhoCorasick;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Positional field names of a `@`-separated equipment-slot record.
/// Records may legitimately arrive truncated; trailing fields are optional.
const SLOT_FIELDS: &[&str] = &[
    "id",
    "name",
    "image",
    "kind",
    "level",
    "mass",
    "price",
    "durability",
];

/// Markers that indicate a page carries telemetry or fight-state literals.
/// Used as a cheap pre-scan before running the heavier extraction passes.
const TELEMETRY_MARKERS: &[&str] = &["ins_hp(", "var hpmp", "var flist", "var slots"];

fn telemetry_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::new(TELEMETRY_MARKERS).expect("static marker set must compile")
    })
}

fn ins_hp_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"ins_hp\(([^)]*)\)").expect("static regex must compile"))
}

/// Fast check: does this page contain any embedded telemetry literal at all?
pub fn has_telemetry_markers(text: &str) -> bool {
    telemetry_matcher().is_match(text)
}

/// Return the substring between the FIRST occurrence of `start` and the next
/// occurrence of `end` after it.
///
/// Binds to the first `start` even when the marker repeats later in the page.
/// Returns `None` when either marker is missing; never panics, regardless of
/// input.
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    if start.is_empty() || end.is_empty() {
        return None;
    }
    let from = text.find(start)? + start.len();
    let rest = &text[from..];
    let to = rest.find(end)?;
    Some(&rest[..to])
}

/// Parse the body of a nested pseudo-array literal into rows of string cells.
///
/// Input is the text between the outer brackets of `[[...],[...],...]`; each
/// inner `[...]` becomes one row, cells split on `,` with surrounding quotes
/// and whitespace trimmed. Rows without a closing bracket are dropped.
pub fn parse_pseudo_array(body: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut rest = body;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            // Truncated row: the server occasionally cuts literals short.
            break;
        };
        let row: Vec<String> = after[..close].split(',').map(clean_cell).collect();
        rows.push(row);
        rest = &after[close + 1..];
    }
    rows
}

/// Parse a flat (non-nested) pseudo-array body: `"a","b","c"` → one row.
pub fn parse_flat_array(body: &str) -> Vec<String> {
    body.split(',').map(clean_cell).collect()
}

fn clean_cell(cell: &str) -> String {
    cell.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

/// Parse `@`-separated slot records, each `:`-separated into positional
/// fields named by [`SLOT_FIELDS`]. Lenient to missing trailing fields;
/// records with no `id` field at all are skipped.
pub fn parse_slot_records(text: &str) -> Vec<HashMap<String, String>> {
    text.split('@')
        .filter_map(|record| {
            let record = record.trim();
            if record.is_empty() {
                return None;
            }
            let mut fields = HashMap::new();
            for (name, value) in SLOT_FIELDS.iter().zip(record.split(':')) {
                fields.insert(name.to_string(), value.trim().to_string());
            }
            if fields.get("id").map(|v| v.is_empty()).unwrap_or(true) {
                return None;
            }
            Some(fields)
        })
        .collect()
}

/// Scan a page for `ins_hp(a,b,c,d,hp,mp,...)` calls and return every
/// `(hp, mp)` pair where both arguments (positions 4 and 5, 0-indexed) parse
/// as numbers. Calls with fewer arguments or non-numeric values are ignored.
pub fn scan_ins_hp(text: &str) -> Vec<(f64, f64)> {
    let mut out = Vec::new();
    for caps in ins_hp_regex().captures_iter(text) {
        let args: Vec<&str> = caps[1].split(',').map(str::trim).collect();
        if args.len() < 6 {
            continue;
        }
        if let (Ok(hp), Ok(mp)) = (args[4].parse::<f64>(), args[5].parse::<f64>()) {
            out.push((hp, mp));
        }
    }
    out
}

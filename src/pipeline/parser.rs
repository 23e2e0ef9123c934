//! Lab-report text parser.
//!
//! Scans OCR output for entries shaped `NAME VALUE [UNIT] RANGE` and
//! computes an out-of-range flag per entry. Noise around the entries is
//! skipped; text with no recognizable entries parses to an empty list.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::LabTestRecord;

/// One lab-test entry: uppercase name, numeric value, optional unit
/// token, `min-max` reference range. The name class is uppercase-only
/// (plus space and parentheses), matching how reports print test
/// names; lowercase prose never starts a match. Number subpatterns are
/// ASCII-only so every captured number is parseable as `f64`.
static LAB_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?P<name>[A-Z \(\)]+)\s+(?P<value>[0-9]+(?:\.[0-9]+)?)\s*(?P<unit>[a-zA-Z/%]+)?\s+(?P<range>[0-9]+(?:\.[0-9]+)?-[0-9]+(?:\.[0-9]+)?)",
    )
    .unwrap()
});

/// Extract every recognizable lab-test entry from `text`, in source
/// order. Total over arbitrary input: OCR garbage, prose, and the
/// empty string all yield an empty list rather than an error.
pub fn parse_lab_report(text: &str) -> Vec<LabTestRecord> {
    LAB_ENTRY
        .captures_iter(text)
        .filter_map(|caps| record_from_captures(&caps))
        .collect()
}

/// Build one record from a match. Returns `None` only if a captured
/// number fails to parse, which the match grammar rules out.
fn record_from_captures(caps: &Captures<'_>) -> Option<LabTestRecord> {
    let name = caps.name("name")?.as_str().trim();
    let value: f64 = caps.name("value")?.as_str().parse().ok()?;
    let unit = caps.name("unit").map_or("", |m| m.as_str());
    let range = caps.name("range")?.as_str();

    let (ref_min, ref_max) = parse_reference_range(range)?;
    let out_of_range = value < ref_min || value > ref_max;

    Some(LabTestRecord {
        test_name: name.to_string(),
        test_value: value.to_string(),
        test_unit: unit.to_string(),
        bio_reference_range: range.to_string(),
        lab_test_out_of_range: out_of_range,
    })
}

/// Split a `min-max` range on its separator and parse both bounds.
/// The separator is the sole `-` in the token; negative bounds are out
/// of scope.
fn parse_reference_range(range: &str) -> Option<(f64, f64)> {
    let (low, high) = range.split_once('-')?;
    Some((low.parse().ok()?, high.parse().ok()?))
}

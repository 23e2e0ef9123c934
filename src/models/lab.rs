use serde::{Deserialize, Serialize};

/// One lab-test entry extracted from report text.
///
/// `test_value` is kept as a string for display fidelity; parsing it back
/// to `f64` recovers the exact number used for the range comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabTestRecord {
    pub test_name: String,
    pub test_value: String,
    /// Empty string when the report prints no unit for this entry.
    pub test_unit: String,
    /// The `min-max` range as printed, unparsed.
    pub bio_reference_range: String,
    pub lab_test_out_of_range: bool,
}

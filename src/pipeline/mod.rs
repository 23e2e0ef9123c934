pub mod extraction;
pub mod parser;

pub use extraction::*;
pub use parser::parse_lab_report;

use crate::models::LabTestRecord;

/// Full image-to-records pipeline: decode check, OCR, then parse.
/// Parsing itself never fails; any error here comes from the image
/// bytes or the OCR engine.
pub fn process_report_image(
    engine: &dyn OcrEngine,
    image_bytes: &[u8],
) -> Result<Vec<LabTestRecord>, ExtractionError> {
    let page = extraction::extract_text(engine, image_bytes)?;

    tracing::debug!(
        confidence = page.confidence,
        chars = page.text.len(),
        "OCR text extracted"
    );

    Ok(parse_lab_report(&page.text))
}

pub mod ocr;
pub mod types;

pub use ocr::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Image decoding failed: {0}")]
    ImageDecode(String),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),

    #[error("OCR support not compiled in (rebuild with the `ocr` feature)")]
    OcrUnavailable,
}

/// Decode-check the upload, then run it through the OCR engine.
/// Bytes the `image` crate cannot decode are rejected before the
/// engine is invoked.
pub fn extract_text(
    engine: &dyn OcrEngine,
    image_bytes: &[u8],
) -> Result<OcrPageResult, ExtractionError> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| ExtractionError::ImageDecode(e.to_string()))?;

    tracing::debug!(
        width = decoded.width(),
        height = decoded.height(),
        "Upload decoded"
    );

    engine.ocr_image(image_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 4x4 white PNG, encoded in memory.
    fn tiny_png() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn extract_text_passes_decodable_image_to_engine() {
        let engine = MockOcrEngine::new("GLUCOSE 90 70-100", 0.9);
        let page = extract_text(&engine, &tiny_png()).unwrap();
        assert_eq!(page.text, "GLUCOSE 90 70-100");
    }

    #[test]
    fn extract_text_rejects_undecodable_bytes() {
        let engine = MockOcrEngine::new("never reached", 0.9);
        let result = extract_text(&engine, b"definitely not an image");
        assert!(matches!(result, Err(ExtractionError::ImageDecode(_))));
    }

    #[test]
    fn extract_text_rejects_empty_upload() {
        let engine = MockOcrEngine::new("never reached", 0.9);
        let result = extract_text(&engine, &[]);
        assert!(matches!(result, Err(ExtractionError::ImageDecode(_))));
    }
}

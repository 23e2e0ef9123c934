use super::ExtractionError;

/// Raw OCR result for one report image.
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean recognition confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests).
/// Engines are shared across requests behind an `Arc`, hence the
/// `Send + Sync` bounds.
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

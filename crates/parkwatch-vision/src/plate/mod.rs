//! License plate extraction, OCR and validation.

mod ocr;
mod preprocess;
mod reader;
mod text;

pub use ocr::{select_best_candidate, OcrCandidate, PlateOcr, PlateRegionDetector};
pub use preprocess::{enhance_contrast, resize_to_height, standard_preprocess};
pub use reader::{PlateReader, PlateReaderConfig, TextRead};
pub use text::{clean_plate_text, PlateValidator, DEFAULT_PLATE_PATTERNS};

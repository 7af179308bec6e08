// OCR engine adapter - CRNN recognition over rasterized pages
use std::path::PathBuf;

use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage};
use ndarray::Array1;
use ort::{inputs, session::builder::GraphOptimizationLevel, session::Session, value::Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{OCR_CONFIDENCE_FLOOR, OCR_STRIP_HEIGHT, OCR_STRIP_MAX_WIDTH};
use crate::error::ExtractionError;

const RECOGNIZER_FILE: &str = "recognizer_es_en.onnx";
const CHARSET_FILE: &str = "charset_es_en.txt";

/// Ignore bands shorter than this; they are specks, not text lines.
const MIN_BAND_HEIGHT: u32 = 4;

/// One recognized region of a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrDetection {
    /// Left, top, right, bottom in page pixels.
    pub bbox: [u32; 4],
    pub text: String,
    pub confidence: f32,
}

/// Text recognition engine over ONNX Runtime.
///
/// Model loading is expensive, so one engine is created per process and
/// reused across requests; `new` is cheap and the session is loaded lazily
/// on first use. The charset covers the two calibrated scripts (Spanish and
/// English), class 0 being the CTC blank.
pub struct OcrEngine {
    model_dir: PathBuf,
    recognizer: Option<Session>,
    charset: Vec<char>,
    initialized: bool,
}

impl OcrEngine {
    pub fn new(model_dir: PathBuf) -> Self {
        Self {
            model_dir,
            recognizer: None,
            charset: Vec::new(),
            initialized: false,
        }
    }

    pub fn initialize(&mut self) -> Result<(), ExtractionError> {
        if self.initialized {
            return Ok(());
        }

        let _ = ort::init();

        let model_path = self.model_dir.join(RECOGNIZER_FILE);
        let charset_path = self.model_dir.join(CHARSET_FILE);
        if !model_path.exists() || !charset_path.exists() {
            return Err(ExtractionError::OcrUnavailable(format!(
                "recognition model not found under {}",
                self.model_dir.display()
            )));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(4))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(|e| ExtractionError::OcrUnavailable(e.to_string()))?;

        let charset_raw = std::fs::read_to_string(&charset_path)?;
        let charset: Vec<char> = charset_raw
            .lines()
            .filter_map(|line| line.chars().next())
            .collect();
        if charset.is_empty() {
            return Err(ExtractionError::OcrUnavailable(format!(
                "charset file {} is empty",
                charset_path.display()
            )));
        }

        debug!(classes = charset.len() + 1, "OCR recognizer loaded");
        self.recognizer = Some(session);
        self.charset = charset;
        self.initialized = true;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.initialized && self.recognizer.is_some()
    }

    /// Recognize every text band of a page image.
    ///
    /// Failures on a single strip are logged and skipped; the page result is
    /// whatever the remaining strips produced.
    pub fn recognize_page(
        &mut self,
        page: &DynamicImage,
    ) -> Result<Vec<OcrDetection>, ExtractionError> {
        self.initialize()?;
        let recognizer = self.recognizer.as_mut().ok_or_else(|| {
            ExtractionError::OcrUnavailable("recognizer session not loaded".to_string())
        })?;

        let gray = page.to_luma8();
        let mut detections = Vec::new();

        for (top, bottom) in text_bands(&gray) {
            let strip = page.crop_imm(0, top, page.width(), bottom - top);
            match recognize_strip(recognizer, &self.charset, &strip) {
                Ok(Some((text, confidence))) => {
                    detections.push(OcrDetection {
                        bbox: [0, top, page.width(), bottom],
                        text,
                        confidence,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(top, bottom, error = %e, "strip recognition failed");
                    continue;
                }
            }
        }

        debug!(bands = detections.len(), "recognized page");
        Ok(detections)
    }
}

/// Space-join the text of detections that clear the confidence floor.
/// Low-confidence detections are dropped silently; that is filtering, not an
/// error.
pub fn page_text(detections: &[OcrDetection]) -> String {
    detections
        .iter()
        .filter(|d| d.confidence > OCR_CONFIDENCE_FLOOR)
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find horizontal text bands by ink-density projection over the rows.
fn text_bands(gray: &GrayImage) -> Vec<(u32, u32)> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let mut profile = Array1::<f32>::zeros(height as usize);
    for (_, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] < 128 {
            profile[y as usize] += 1.0;
        }
    }
    profile /= width as f32;

    // A row belongs to a band when at least 0.5% of its pixels are inked.
    let threshold = 0.005_f32;
    let mut bands = Vec::new();
    let mut start: Option<u32> = None;

    for y in 0..height {
        let inked = profile[y as usize] > threshold;
        match (inked, start) {
            (true, None) => start = Some(y),
            (false, Some(s)) => {
                if y - s >= MIN_BAND_HEIGHT {
                    bands.push((s.saturating_sub(2), (y + 2).min(height)));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        if height - s >= MIN_BAND_HEIGHT {
            bands.push((s.saturating_sub(2), height));
        }
    }

    bands
}

/// Run one strip through the recognizer and CTC-decode the logits.
///
/// Confidence is the mean best-class probability over the emitted steps.
fn recognize_strip(
    recognizer: &mut Session,
    charset: &[char],
    strip: &DynamicImage,
) -> anyhow::Result<Option<(String, f32)>> {
    // Height-normalize keeping aspect ratio, clamp to the model's max width
    let scale = OCR_STRIP_HEIGHT as f32 / strip.height().max(1) as f32;
    let width = ((strip.width() as f32 * scale).round() as u32).clamp(8, OCR_STRIP_MAX_WIDTH);
    let resized = strip
        .resize_exact(width, OCR_STRIP_HEIGHT, FilterType::Lanczos3)
        .to_luma8();

    // Grayscale tensor normalized to [-1, 1]
    let mut pixels = Vec::with_capacity((OCR_STRIP_HEIGHT * width) as usize);
    for y in 0..OCR_STRIP_HEIGHT {
        for x in 0..width {
            let value = resized.get_pixel(x, y)[0] as f32 / 255.0;
            pixels.push((value - 0.5) / 0.5);
        }
    }

    let input = Value::from_array((
        [1_usize, 1, OCR_STRIP_HEIGHT as usize, width as usize],
        pixels.into_boxed_slice(),
    ))?;
    let outputs = recognizer.run(inputs![input])?;

    // Logits come back as [steps, 1, classes]; class 0 is the CTC blank
    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    let steps = shape[0] as usize;
    let classes = shape[2] as usize;

    let mut text = String::new();
    let mut probs = Vec::new();
    let mut previous_class = 0_usize;
    for step in 0..steps {
        let row = &data[step * classes..(step + 1) * classes];
        let (best_class, best_prob) = softmax_argmax(row);
        if best_class != 0 && best_class != previous_class {
            if let Some(&ch) = charset.get(best_class - 1) {
                text.push(ch);
                probs.push(best_prob);
            }
        }
        previous_class = best_class;
    }

    let text = text.trim().to_string();
    if text.is_empty() || probs.is_empty() {
        return Ok(None);
    }
    let confidence = probs.iter().sum::<f32>() / probs.len() as f32;
    Ok(Some((text, confidence)))
}

fn softmax_argmax(logits: &[f32]) -> (usize, f32) {
    let Some((argmax, best)) = logits
        .iter()
        .copied()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    else {
        return (0, 0.0);
    };
    let exp_sum: f32 = logits.iter().map(|&l| (l - best).exp()).sum();
    (argmax, 1.0 / exp_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn detection(text: &str, confidence: f32) -> OcrDetection {
        OcrDetection {
            bbox: [0, 0, 10, 10],
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn confidence_floor_filters_low_detections() {
        let detections = vec![
            detection("LECHE", 0.92),
            detection("XYZ", 0.49),
            detection("PAN", 0.51),
            detection("BORDERLINE", 0.5),
        ];
        let text = page_text(&detections);
        assert_eq!(text, "LECHE PAN");
        assert!(!text.contains("XYZ"));
    }

    #[test]
    fn empty_detections_give_empty_text() {
        assert_eq!(page_text(&[]), "");
    }

    #[test]
    fn text_bands_find_inked_rows() {
        let mut img = GrayImage::from_pixel(100, 60, Luma([255u8]));
        for y in 10..22 {
            for x in 0..100 {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
        let bands = text_bands(&img);
        assert_eq!(bands.len(), 1);
        let (top, bottom) = bands[0];
        assert!(top <= 10 && bottom >= 22);
    }

    #[test]
    fn blank_page_has_no_bands() {
        let img = GrayImage::from_pixel(80, 40, Luma([255u8]));
        assert!(text_bands(&img).is_empty());
    }

    #[test]
    fn softmax_argmax_picks_dominant_class() {
        let (class, prob) = softmax_argmax(&[0.0, 8.0, 1.0]);
        assert_eq!(class, 1);
        assert!(prob > 0.9);
    }
}

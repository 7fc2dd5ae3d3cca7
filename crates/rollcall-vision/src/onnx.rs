//! ONNX-backed face detection and embedding.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use rollcall_core::{Detection, EncoderError, FaceEncoder, Region, Template, TEMPLATE_DIM};
use std::path::Path;
use thiserror::Error;

// Detector: fixed square input, /255 normalization, output rows of
// [x1, y1, x2, y2, score] in coordinates normalized to [0, 1].
const DETECTOR_INPUT_SIZE: u32 = 320;
const DETECTOR_ROW_LEN: usize = 5;
/// Raw model floor; the enrollment confidence threshold is applied
/// upstream by the selector, on top of this.
const DETECTOR_SCORE_FLOOR: f32 = 0.5;

// Embedder: symmetric normalization around 127.5.
const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Face encoder backed by two ONNX sessions.
///
/// Loaded once at process start and owned by the engine thread; the
/// sessions are the only mutable state.
pub struct OnnxEncoder {
    detector: Session,
    embedder: Session,
}

impl OnnxEncoder {
    /// Load both models, failing fast if either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, VisionError> {
        let detector = load_session(detector_path)?;
        tracing::info!(path = detector_path, "face detector loaded");
        let embedder = load_session(embedder_path)?;
        tracing::info!(path = embedder_path, "face embedder loaded");
        Ok(Self { detector, embedder })
    }
}

fn load_session(path: &str) -> Result<Session, VisionError> {
    if !Path::new(path).exists() {
        return Err(VisionError::ModelNotFound(path.to_string()));
    }
    Ok(Session::builder()?
        .with_intra_threads(2)?
        .commit_from_file(path)?)
}

impl FaceEncoder for OnnxEncoder {
    fn detect(&mut self, image: &[u8]) -> Result<Vec<Detection>, EncoderError> {
        let rgb = decode_rgb(image)?;
        let (orig_w, orig_h) = rgb.dimensions();

        let resized = image::imageops::resize(
            &rgb,
            DETECTOR_INPUT_SIZE,
            DETECTOR_INPUT_SIZE,
            FilterType::Triangle,
        );
        let input = to_nchw(&resized, |p| p / 255.0);

        let outputs = self
            .detector
            .run(ort::inputs![TensorRef::from_array_view(input.view())
                .map_err(|e| EncoderError::InferenceFailed(e.to_string()))?])
            .map_err(|e| EncoderError::InferenceFailed(e.to_string()))?;

        let (_, rows) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("detector output: {e}")))?;

        let mut detections = decode_detections(rows, orig_w as f32, orig_h as f32);
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(detections)
    }

    fn embed(&mut self, image: &[u8], region: &Region) -> Result<Template, EncoderError> {
        let rgb = decode_rgb(image)?;
        let crop = crop_region(&rgb, region).ok_or(EncoderError::EmbeddingFailed)?;

        let resized =
            image::imageops::resize(&crop, EMBED_INPUT_SIZE, EMBED_INPUT_SIZE, FilterType::Triangle);
        let input = to_nchw(&resized, |p| (p - EMBED_MEAN) / EMBED_STD);

        let outputs = self
            .embedder
            .run(ort::inputs![TensorRef::from_array_view(input.view())
                .map_err(|e| EncoderError::InferenceFailed(e.to_string()))?])
            .map_err(|e| EncoderError::InferenceFailed(e.to_string()))?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding output: {e}")))?;

        if raw.len() != TEMPLATE_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {TEMPLATE_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Template::new(l2_normalize(raw)))
    }
}

fn decode_rgb(image: &[u8]) -> Result<RgbImage, EncoderError> {
    image::load_from_memory(image)
        .map(|img| img.to_rgb8())
        .map_err(|e| EncoderError::InvalidImage(e.to_string()))
}

/// HWC u8 image to NCHW f32 tensor with a per-pixel normalizer.
fn to_nchw(rgb: &RgbImage, normalize: impl Fn(f32) -> f32) -> Array4<f32> {
    let (w, h) = rgb.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = normalize(pixel[c] as f32);
        }
    }
    tensor
}

/// Decode post-NMS detector rows and scale them to source-image pixels.
fn decode_detections(rows: &[f32], width: f32, height: f32) -> Vec<Detection> {
    rows.chunks_exact(DETECTOR_ROW_LEN)
        .filter(|row| row[4] > DETECTOR_SCORE_FLOOR)
        .map(|row| {
            let x1 = row[0] * width;
            let y1 = row[1] * height;
            let x2 = row[2] * width;
            let y2 = row[3] * height;
            Detection {
                confidence: row[4],
                region: Region {
                    x: x1,
                    y: y1,
                    width: x2 - x1,
                    height: y2 - y1,
                },
            }
        })
        .collect()
}

/// Crop the (already clamped) region out of the frame, bounded to the
/// frame itself. Returns `None` for a degenerate crop.
fn crop_region(rgb: &RgbImage, region: &Region) -> Option<RgbImage> {
    let (img_w, img_h) = rgb.dimensions();
    let x = (region.x.round() as u32).min(img_w.saturating_sub(1));
    let y = (region.y.round() as u32).min(img_h.saturating_sub(1));
    let w = (region.width.round() as u32).min(img_w - x);
    let h = (region.height.round() as u32).min(img_h - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(rgb, x, y, w, h).to_image())
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_detections_scales_to_pixels() {
        let rows = [0.25, 0.5, 0.75, 1.0, 0.9];
        let dets = decode_detections(&rows, 640.0, 480.0);
        assert_eq!(dets.len(), 1);
        let r = dets[0].region;
        assert_eq!(r.x, 160.0);
        assert_eq!(r.y, 240.0);
        assert_eq!(r.width, 320.0);
        assert_eq!(r.height, 240.0);
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_detections_applies_floor() {
        let rows = [0.0, 0.0, 0.5, 0.5, 0.4, 0.1, 0.1, 0.6, 0.6, 0.95];
        let dets = decode_detections(&rows, 100.0, 100.0);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].confidence - 0.95).abs() < 1e-6);
    }

    #[test]
    fn test_decode_detections_ignores_trailing_partial_row() {
        let rows = [0.0, 0.0, 0.5, 0.5, 0.9, 0.1, 0.2];
        assert_eq!(decode_detections(&rows, 100.0, 100.0).len(), 1);
    }

    #[test]
    fn test_l2_normalize_unit_norm() {
        let out = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = out.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_crop_region_degenerate() {
        let rgb = RgbImage::new(64, 64);
        let r = Region {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 0.0,
        };
        assert!(crop_region(&rgb, &r).is_none());
    }

    #[test]
    fn test_crop_region_bounded_to_frame() {
        let rgb = RgbImage::new(64, 64);
        let r = Region {
            x: 50.0,
            y: 50.0,
            width: 100.0,
            height: 100.0,
        };
        let crop = crop_region(&rgb, &r).unwrap();
        assert_eq!(crop.dimensions(), (14, 14));
    }
}

//! Best-shot selection over a burst of enrollment captures.

use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::Template;

/// Winning capture of an enrollment burst.
#[derive(Debug, Clone)]
pub struct BestShot {
    pub template: Template,
    /// Index of the winning image within the burst, for audit logs.
    pub image_index: usize,
    pub confidence: f32,
}

/// Pick the single best template from a burst of candidate images.
///
/// Each image contributes at most its highest-confidence detection. A
/// candidate replaces the running best only when its confidence
/// strictly exceeds the incumbent's and clears `confidence_threshold`
/// — a tie keeps the earlier winner. Qualifying candidates are embedded
/// immediately; if the embedder fails on one, that candidate is skipped
/// and the incumbent stands, so a later image can still win.
///
/// Returns `Ok(None)` when no image produced a qualifying, embeddable
/// detection. Callers treat that as a recoverable rejection of the
/// enrollment, not a fault. No storage writes happen here.
pub fn select_best_shot<E: FaceEncoder + ?Sized>(
    encoder: &mut E,
    images: &[Vec<u8>],
    confidence_threshold: f32,
) -> Result<Option<BestShot>, EncoderError> {
    let mut best: Option<BestShot> = None;

    for (index, image) in images.iter().enumerate() {
        let detections = encoder.detect(image)?;

        let Some(candidate) = detections.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        }) else {
            tracing::debug!(image = index, "no detections, skipping image");
            continue;
        };

        let incumbent_confidence = best.as_ref().map_or(0.0, |b| b.confidence);
        if candidate.confidence <= incumbent_confidence
            || candidate.confidence < confidence_threshold
        {
            continue;
        }

        let region = candidate.region.clamped();
        match encoder.embed(image, &region) {
            Ok(template) => {
                tracing::debug!(
                    image = index,
                    confidence = candidate.confidence,
                    "new best shot"
                );
                best = Some(BestShot {
                    template,
                    image_index: index,
                    confidence: candidate.confidence,
                });
            }
            Err(EncoderError::EmbeddingFailed) => {
                tracing::debug!(
                    image = index,
                    confidence = candidate.confidence,
                    "embedding failed for candidate, keeping incumbent"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Detection, Region};

    fn det(confidence: f32) -> Detection {
        Detection {
            confidence,
            region: Region {
                x: 10.0,
                y: 10.0,
                width: 50.0,
                height: 50.0,
            },
        }
    }

    /// Scripted encoder: one detection list per image in call order.
    /// Embeds succeed unless the image index is listed in `fail_embeds`;
    /// successful embeds yield a template tagged with the image index.
    struct ScriptedEncoder {
        per_image: Vec<Vec<Detection>>,
        fail_embeds: Vec<usize>,
        detect_calls: usize,
        embed_regions: Vec<Region>,
    }

    impl ScriptedEncoder {
        fn new(per_image: Vec<Vec<Detection>>) -> Self {
            Self {
                per_image,
                fail_embeds: vec![],
                detect_calls: 0,
                embed_regions: vec![],
            }
        }
    }

    impl FaceEncoder for ScriptedEncoder {
        fn detect(&mut self, _image: &[u8]) -> Result<Vec<Detection>, EncoderError> {
            let dets = self.per_image[self.detect_calls].clone();
            self.detect_calls += 1;
            Ok(dets)
        }

        fn embed(&mut self, _image: &[u8], region: &Region) -> Result<Template, EncoderError> {
            let image_index = self.detect_calls - 1;
            if self.fail_embeds.contains(&image_index) {
                return Err(EncoderError::EmbeddingFailed);
            }
            self.embed_regions.push(*region);
            Ok(Template::new(vec![image_index as f32]))
        }
    }

    fn burst(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| vec![i as u8]).collect()
    }

    #[test]
    fn test_picks_highest_qualifying_confidence() {
        let mut enc = ScriptedEncoder::new(vec![
            vec![det(0.85)],
            vec![],
            vec![det(0.93)],
            vec![det(0.91)],
            vec![],
        ]);
        let best = select_best_shot(&mut enc, &burst(5), 0.90).unwrap().unwrap();
        assert_eq!(best.image_index, 2);
        assert!((best.confidence - 0.93).abs() < 1e-6);
        assert_eq!(best.template.values, vec![2.0]);
    }

    #[test]
    fn test_none_when_nothing_clears_threshold() {
        let mut enc = ScriptedEncoder::new(vec![vec![det(0.85)], vec![det(0.89)], vec![]]);
        assert!(select_best_shot(&mut enc, &burst(3), 0.90).unwrap().is_none());
    }

    #[test]
    fn test_confidence_equal_to_threshold_qualifies() {
        let mut enc = ScriptedEncoder::new(vec![vec![det(0.90)]]);
        let best = select_best_shot(&mut enc, &burst(1), 0.90).unwrap().unwrap();
        assert_eq!(best.image_index, 0);
    }

    #[test]
    fn test_tie_keeps_earlier_winner() {
        let mut enc = ScriptedEncoder::new(vec![vec![det(0.95)], vec![det(0.95)]]);
        let best = select_best_shot(&mut enc, &burst(2), 0.90).unwrap().unwrap();
        assert_eq!(best.image_index, 0);
    }

    #[test]
    fn test_takes_max_detection_within_image() {
        let mut enc = ScriptedEncoder::new(vec![vec![det(0.91), det(0.97), det(0.50)]]);
        let best = select_best_shot(&mut enc, &burst(1), 0.90).unwrap().unwrap();
        assert!((best.confidence - 0.97).abs() < 1e-6);
    }

    #[test]
    fn test_embed_failure_lets_later_image_win() {
        let mut enc = ScriptedEncoder::new(vec![vec![det(0.94)], vec![det(0.91)]]);
        enc.fail_embeds = vec![0];
        let best = select_best_shot(&mut enc, &burst(2), 0.90).unwrap().unwrap();
        // 0.91 beats an incumbent that never materialized
        assert_eq!(best.image_index, 1);
        assert!((best.confidence - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_embeds_clamped_region() {
        let mut enc = ScriptedEncoder::new(vec![vec![Detection {
            confidence: 0.95,
            region: Region {
                x: -8.0,
                y: -2.0,
                width: 40.0,
                height: 40.0,
            },
        }]]);
        select_best_shot(&mut enc, &burst(1), 0.90).unwrap().unwrap();
        assert_eq!(enc.embed_regions.len(), 1);
        assert_eq!(enc.embed_regions[0].x, 0.0);
        assert_eq!(enc.embed_regions[0].y, 0.0);
        assert_eq!(enc.embed_regions[0].width, 32.0);
        assert_eq!(enc.embed_regions[0].height, 38.0);
    }

    #[test]
    fn test_empty_burst() {
        let mut enc = ScriptedEncoder::new(vec![]);
        assert!(select_best_shot(&mut enc, &[], 0.90).unwrap().is_none());
    }
}

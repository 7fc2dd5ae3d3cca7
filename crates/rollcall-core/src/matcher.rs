//! Gallery matching under a distance tolerance.

use crate::types::{GalleryEntry, Match, Template};

/// Scan the gallery for the live template.
///
/// First-match policy: entries are visited in enumeration order and the
/// first one within `tolerance` wins, even if a later entry is closer.
/// Two enrolled subjects both within tolerance of the same sample
/// therefore resolve by gallery order; this mirrors the shipped
/// behavior and is pinned by a test rather than silently changed to
/// best-distance.
///
/// `None` (empty gallery, or nothing within tolerance) is an expected
/// outcome, not an error.
pub fn find_match(live: &Template, gallery: &[GalleryEntry], tolerance: f32) -> Option<Match> {
    for entry in gallery {
        let distance = live.euclidean_distance(&entry.template);
        if distance <= tolerance {
            tracing::debug!(
                subject_id = entry.subject_id,
                distance,
                tolerance,
                "gallery match"
            );
            return Some(Match {
                subject_id: entry.subject_id,
                distance,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject_id: i64, values: Vec<f32>) -> GalleryEntry {
        GalleryEntry {
            subject_id,
            template: Template::new(values),
        }
    }

    #[test]
    fn test_match_within_tolerance() {
        let gallery = vec![entry(7, vec![0.0, 0.0]), entry(8, vec![10.0, 0.0])];
        let live = Template::new(vec![0.3, 0.0]);
        let m = find_match(&live, &gallery, 0.5).unwrap();
        assert_eq!(m.subject_id, 7);
        assert!((m.distance - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_no_match_outside_tolerance() {
        let gallery = vec![entry(7, vec![0.0, 0.0])];
        let live = Template::new(vec![0.0, 0.51]);
        assert!(find_match(&live, &gallery, 0.5).is_none());
    }

    #[test]
    fn test_distance_equal_to_tolerance_matches() {
        let gallery = vec![entry(7, vec![0.0, 0.0])];
        let live = Template::new(vec![0.5, 0.0]);
        assert!(find_match(&live, &gallery, 0.5).is_some());
    }

    #[test]
    fn test_empty_gallery() {
        let live = Template::new(vec![0.0, 0.0]);
        assert!(find_match(&live, &[], 0.5).is_none());
    }

    #[test]
    fn test_first_match_wins_over_closer_later_entry() {
        // Both entries are within tolerance; the second is strictly
        // closer but the first one in enumeration order is returned.
        let gallery = vec![entry(1, vec![0.4, 0.0]), entry(2, vec![0.1, 0.0])];
        let live = Template::new(vec![0.0, 0.0]);
        let m = find_match(&live, &gallery, 0.5).unwrap();
        assert_eq!(m.subject_id, 1);
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Biometric template: a fixed-length embedding vector (128-dimensional
/// in production, see [`crate::codec::TEMPLATE_DIM`]).
///
/// Templates are produced once by the enrollment pipeline and compared
/// only through [`euclidean_distance`](Self::euclidean_distance), never
/// by equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub values: Vec<f32>,
}

impl Template {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance between two templates. Lower = more similar.
    pub fn euclidean_distance(&self, other: &Template) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Rectangular region of a detected face, in pixel coordinates of the
/// source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// Clamp the region to non-negative coordinates.
    ///
    /// Each edge (left, top, right, bottom) is clamped at zero
    /// independently, then width/height are re-derived. A box hanging
    /// off the top-left of the frame shrinks rather than shifts.
    pub fn clamped(&self) -> Region {
        let left = self.x.max(0.0);
        let top = self.y.max(0.0);
        let right = (self.x + self.width).max(0.0);
        let bottom = (self.y + self.height).max(0.0);
        Region {
            x: left,
            y: top,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }
}

/// One face found by the detector in a single image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub confidence: f32,
    pub region: Region,
}

/// One enrolled row of the gallery snapshot the matcher scans.
///
/// The gallery is whatever was loaded at match time; enrollments that
/// commit mid-scan are not visible until the next load.
#[derive(Debug, Clone)]
pub struct GalleryEntry {
    pub subject_id: i64,
    pub template: Template,
}

/// Successful match: which subject, and at what distance (diagnostics).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub subject_id: i64,
    pub distance: f32,
}

/// Attendance status for one recognition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "on_time",
            AttendanceStatus::Late => "late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_time" => Ok(AttendanceStatus::OnTime),
            "late" => Ok(AttendanceStatus::Late),
            other => Err(format!("unknown attendance status: {other}")),
        }
    }
}

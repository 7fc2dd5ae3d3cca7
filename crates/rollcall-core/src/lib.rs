//! rollcall-core — Biometric attendance engine.
//!
//! Pure algorithms: best-shot selection over enrollment captures,
//! distance-tolerance gallery matching, and the attendance state
//! machine with its decaying reliability score. All I/O (camera,
//! inference, storage) lives behind the [`FaceEncoder`] trait and the
//! store crate.

pub mod codec;
pub mod encoder;
pub mod matcher;
pub mod scorer;
pub mod selector;
pub mod types;

pub use codec::{decode, encode, CodecError, TEMPLATE_DIM};
pub use encoder::{EncoderError, FaceEncoder};
pub use matcher::find_match;
pub use scorer::{evaluate, ScorePolicy};
pub use selector::{select_best_shot, BestShot};
pub use types::{AttendanceStatus, Detection, GalleryEntry, Match, Region, Template};

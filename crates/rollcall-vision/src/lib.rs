//! rollcall-vision — ONNX Runtime implementation of the encoder boundary.
//!
//! Two models: a face detector exporting post-NMS boxes, and an
//! embedding network producing 128-dimensional templates from face
//! crops. Both run on CPU.

mod onnx;

pub use onnx::{OnnxEncoder, VisionError};

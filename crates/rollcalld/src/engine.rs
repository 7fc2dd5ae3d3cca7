use rollcall_core::{select_best_shot, BestShot, EncoderError, FaceEncoder, Template};
use rollcall_vision::{OnnxEncoder, VisionError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
    #[error("no capture cleared the confidence threshold")]
    NoTemplate,
    #[error("no face detected in the capture")]
    NoFaceDetected,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Enroll {
        images: Vec<Vec<u8>>,
        reply: oneshot::Sender<Result<BestShot, EngineError>>,
    },
    Encode {
        image: Vec<u8>,
        reply: oneshot::Sender<Result<Template, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Best-shot selection over an enrollment burst.
    pub async fn enroll(&self, images: Vec<Vec<u8>>) -> Result<BestShot, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                images,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Encode a live capture into a template for matching.
    pub async fn encode(&self, image: Vec<u8>) -> Result<Template, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Encode {
                image,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models synchronously (fail-fast at startup), then
/// enters a request loop. The encoder lives on this thread only, so
/// inference is serialized and the async side never blocks on it.
pub fn spawn_engine(
    detector_path: &str,
    embedder_path: &str,
    confidence_threshold: f32,
) -> Result<EngineHandle, EngineError> {
    let mut encoder = OnnxEncoder::load(detector_path, embedder_path)?;

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll { images, reply } => {
                        let result = run_enroll(&mut encoder, &images, confidence_threshold);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Encode { image, reply } => {
                        let result = run_encode(&mut encoder, &image);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

fn run_enroll(
    encoder: &mut OnnxEncoder,
    images: &[Vec<u8>],
    confidence_threshold: f32,
) -> Result<BestShot, EngineError> {
    let best = select_best_shot(encoder, images, confidence_threshold)?
        .ok_or(EngineError::NoTemplate)?;
    tracing::info!(
        image = best.image_index,
        confidence = best.confidence,
        "enroll: best shot selected"
    );
    Ok(best)
}

/// Live path: take the top detection of the single capture and embed it.
fn run_encode(encoder: &mut OnnxEncoder, image: &[u8]) -> Result<Template, EngineError> {
    let detections = encoder.detect(image)?;
    let Some(face) = detections.first() else {
        return Err(EngineError::NoFaceDetected);
    };
    tracing::debug!(confidence = face.confidence, "live face detected");

    match encoder.embed(image, &face.region.clamped()) {
        Ok(template) => Ok(template),
        Err(EncoderError::EmbeddingFailed) => Err(EngineError::NoFaceDetected),
        Err(e) => Err(e.into()),
    }
}

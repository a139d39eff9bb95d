//! Detection: the decoder boundary and the frame admission gate
//!
//! The symbol decoder itself is external: anything implementing
//! [`FrameDetector`] can be injected, including the deterministic
//! scripted detector shipped under the `test-source` feature. Decoded
//! payloads flow into a [`DetectionSink`], one call per analyzed frame.

pub mod gate;

#[cfg(feature = "test-source")]
pub mod scripted;

use async_trait::async_trait;

use crate::frame::Frame;

pub use gate::{FrameGate, GateControl};

#[cfg(feature = "test-source")]
pub use scripted::ScriptedDetector;

/// Decodes barcode payloads out of one frame.
///
/// Asynchronous: completion may happen on a different task or thread
/// than the caller's. Zero results is the common case and not an error.
#[async_trait]
pub trait FrameDetector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> anyhow::Result<Vec<String>>;
}

/// Receives the payloads decoded from one frame, in the detector's
/// stable order.
#[async_trait]
pub trait DetectionSink: Send + Sync {
    async fn on_detections(&self, payloads: Vec<String>);
}

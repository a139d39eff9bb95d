//! Deterministic detector for tests and the demo terminal

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::FrameDetector;
use crate::frame::Frame;

/// Detector that replays queued results instead of decoding pixels.
///
/// Each `detect` call pops the next queued batch; an empty queue decodes
/// nothing. Tests push a batch and wait for the pipeline to react.
#[derive(Default)]
pub struct ScriptedDetector {
    queue: Mutex<VecDeque<Vec<String>>>,
    calls: AtomicU64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the payloads the next analyzed frame will "decode".
    pub fn push(&self, payloads: impl IntoIterator<Item = impl Into<String>>) {
        let batch: Vec<String> = payloads.into_iter().map(Into::into).collect();
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(batch);
    }

    /// Number of frames analyzed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FrameDetector for ScriptedDetector {
    async fn detect(&self, _frame: &Frame) -> anyhow::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default())
    }
}

//! Frame admission between the camera and the detector
//!
//! The camera pushes frames at hardware rate; detection takes as long as
//! it takes. The gate keeps at most one frame in flight and drops the
//! rest: for live scanning only the next frame's freshness matters, so
//! dropping beats queuing (which would grow memory and add latency under
//! a slow detector). The camera is never paused by the gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{DetectionSink, FrameDetector};
use crate::frame::Frame;

#[derive(Default)]
struct GateFlags {
    /// One detection in flight
    busy: AtomicBool,
    /// Latched between scan sessions: every submission is dropped
    parked: AtomicBool,
}

/// Shared admission state: the busy slot plus the parked latch.
///
/// Created parked; nothing is admitted until a session unparks it.
#[derive(Clone)]
pub struct GateControl {
    flags: Arc<GateFlags>,
}

impl GateControl {
    pub fn new() -> Self {
        let flags = GateFlags::default();
        flags.parked.store(true, Ordering::Relaxed);
        Self {
            flags: Arc::new(flags),
        }
    }

    /// Drop all submissions until [`unpark`](GateControl::unpark).
    pub fn park(&self) {
        self.flags.parked.store(true, Ordering::Release);
    }

    pub fn unpark(&self) {
        self.flags.parked.store(false, Ordering::Release);
    }

    pub fn is_parked(&self) -> bool {
        self.flags.parked.load(Ordering::Acquire)
    }

    /// Whether a detection is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.flags.busy.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> bool {
        if self.flags.parked.load(Ordering::Acquire) {
            return false;
        }
        self.flags
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn release(&self) {
        self.flags.busy.store(false, Ordering::Release);
    }
}

impl Default for GateControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-blocking, drop-current frame throttle feeding the detection worker.
#[derive(Clone)]
pub struct FrameGate {
    tx: mpsc::Sender<Frame>,
    control: GateControl,
}

impl FrameGate {
    /// Spawn the detection worker and return the gate feeding it.
    ///
    /// Must be called within a tokio runtime. The worker runs the
    /// detector on each admitted frame, hands the result to `sink`, and
    /// only then frees the busy slot. A detector failure is logged,
    /// treated as zero detections, and still frees the slot exactly once.
    pub fn spawn(
        detector: Arc<dyn FrameDetector>,
        sink: Arc<dyn DetectionSink>,
        control: GateControl,
    ) -> FrameGate {
        let (tx, mut rx) = mpsc::channel::<Frame>(1);
        let worker = control.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let payloads = match detector.detect(&frame).await {
                    Ok(payloads) => payloads,
                    Err(e) => {
                        warn!("detector failed, frame treated as empty: {e:#}");
                        Vec::new()
                    }
                };
                sink.on_detections(payloads).await;
                worker.release();
            }
            debug!("detection worker ended");
        });
        FrameGate { tx, control }
    }

    /// Offer a frame. Non-blocking and safe to call from the delivery
    /// thread; returns `false` when the gate is parked or a detection is
    /// already in flight; the frame is simply dropped.
    pub fn submit(&self, frame: Frame) -> bool {
        if !self.control.try_acquire() {
            return false;
        }
        if self.tx.try_send(frame).is_err() {
            // worker gone; never strand the busy slot
            self.control.release();
            return false;
        }
        true
    }

    pub fn park(&self) {
        self.control.park();
    }

    pub fn unpark(&self) {
        self.control.unpark();
    }

    pub fn is_parked(&self) -> bool {
        self.control.is_parked()
    }

    pub fn is_busy(&self) -> bool {
        self.control.is_busy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::frame::PixelFormat;

    fn frame() -> Frame {
        Frame::new(Bytes::from_static(&[0; 16]), 4, 2, PixelFormat::Rgba8)
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }

    /// Detector that blocks until released, counting invocations.
    struct BlockingDetector {
        release: Notify,
        calls: AtomicU64,
    }

    impl BlockingDetector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                release: Notify::new(),
                calls: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl FrameDetector for BlockingDetector {
        async fn detect(&self, _frame: &Frame) -> anyhow::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(vec!["decoded".to_string()])
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl FrameDetector for FailingDetector {
        async fn detect(&self, _frame: &Frame) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("decoder blew up")
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        batches: std::sync::Mutex<Vec<Vec<String>>>,
    }

    impl CollectingSink {
        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DetectionSink for CollectingSink {
        async fn on_detections(&self, payloads: Vec<String>) {
            self.batches.lock().unwrap().push(payloads);
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drops_while_a_detection_is_in_flight() {
        let detector = BlockingDetector::new();
        let sink = Arc::new(CollectingSink::default());
        let control = GateControl::new();
        control.unpark();
        let gate = FrameGate::spawn(detector.clone(), sink.clone(), control);

        assert!(gate.submit(frame()));
        wait_until(|| detector.calls.load(Ordering::SeqCst) == 1).await;

        // in flight: everything else is dropped, the detector is never
        // entered a second time concurrently
        assert!(!gate.submit(frame()));
        assert!(!gate.submit(frame()));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 1);

        detector.release.notify_one();
        wait_until(|| !gate.is_busy()).await;
        assert_eq!(sink.batches(), vec![vec!["decoded".to_string()]]);

        // slot free again
        assert!(gate.submit(frame()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn busy_clears_even_when_the_detector_fails() {
        let sink = Arc::new(CollectingSink::default());
        let control = GateControl::new();
        control.unpark();
        let gate = FrameGate::spawn(Arc::new(FailingDetector), sink.clone(), control);

        assert!(gate.submit(frame()));
        wait_until(|| !gate.is_busy()).await;

        // the failure surfaced as an empty batch and the slot reopened
        assert_eq!(sink.batches(), vec![Vec::<String>::new()]);
        assert!(gate.submit(frame()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parked_gate_drops_everything() {
        let detector = BlockingDetector::new();
        let sink = Arc::new(CollectingSink::default());
        let gate = FrameGate::spawn(detector.clone(), sink, GateControl::new());

        // created parked
        assert!(gate.is_parked());
        assert!(!gate.submit(frame()));
        assert_eq!(detector.calls.load(Ordering::SeqCst), 0);

        gate.unpark();
        assert!(gate.submit(frame()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parking_does_not_clear_an_in_flight_detection() {
        let detector = BlockingDetector::new();
        let sink = Arc::new(CollectingSink::default());
        let control = GateControl::new();
        control.unpark();
        let gate = FrameGate::spawn(detector.clone(), sink.clone(), control);

        assert!(gate.submit(frame()));
        wait_until(|| detector.calls.load(Ordering::SeqCst) == 1).await;

        gate.park();
        detector.release.notify_one();
        wait_until(|| !gate.is_busy()).await;

        // the in-flight result still reached the sink; new frames stay out
        assert_eq!(sink.batches().len(), 1);
        assert!(!gate.submit(frame()));
    }
}

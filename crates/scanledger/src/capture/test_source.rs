//! Synthetic camera for tests and hardware-free development
//!
//! Generates flat gray frames at a fixed rate on its own delivery thread,
//! enforcing the same single-owner lifecycle a real driver has. The
//! driver records what was configured so tests can assert on it.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::bail;
use bytes::Bytes;
use tracing::debug;

use super::camera::{CameraDriver, CameraHandle, FocusMode, FrameSink};
use crate::frame::{Frame, PixelFormat};

/// Configuration for the synthetic camera.
#[derive(Debug, Clone)]
pub struct TestCameraConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
    /// Mounting orientation reported by the fake sensor
    pub sensor_orientation: u32,
    /// Focus modes the fake hardware advertises
    pub focus_modes: Vec<FocusMode>,
}

impl Default for TestCameraConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 120,
            fps: 30,
            format: PixelFormat::Nv21,
            sensor_orientation: 90,
            focus_modes: vec![FocusMode::ContinuousPicture, FocusMode::Auto],
        }
    }
}

// Observations shared between the driver and its handles.
#[derive(Default)]
struct Observed {
    in_use: AtomicBool,
    fail_next_open: AtomicBool,
    opens: AtomicU64,
    delivered: AtomicU64,
    autofocus_calls: AtomicU64,
    // u32::MAX = never set
    display_orientation: AtomicU32,
    focus_mode: Mutex<Option<FocusMode>>,
}

/// Synthetic [`CameraDriver`].
pub struct TestCamera {
    config: TestCameraConfig,
    observed: Arc<Observed>,
}

impl TestCamera {
    pub fn new(config: TestCameraConfig) -> Self {
        let observed = Arc::new(Observed::default());
        observed
            .display_orientation
            .store(u32::MAX, Ordering::Relaxed);
        Self { config, observed }
    }

    /// Make the next `open` fail, as if the camera were held elsewhere.
    pub fn fail_next_open(&self) {
        self.observed.fail_next_open.store(true, Ordering::Relaxed);
    }

    /// Number of successful acquisitions so far.
    pub fn opens(&self) -> u64 {
        self.observed.opens.load(Ordering::Relaxed)
    }

    /// Whether a handle currently holds the fake hardware.
    pub fn is_in_use(&self) -> bool {
        self.observed.in_use.load(Ordering::Acquire)
    }

    /// Total frames delivered across all sessions.
    pub fn delivered(&self) -> u64 {
        self.observed.delivered.load(Ordering::Relaxed)
    }

    /// Autofocus passes requested.
    pub fn autofocus_calls(&self) -> u64 {
        self.observed.autofocus_calls.load(Ordering::Relaxed)
    }

    /// Last display-orientation correction applied, if any.
    pub fn last_display_orientation(&self) -> Option<u32> {
        match self.observed.display_orientation.load(Ordering::Relaxed) {
            u32::MAX => None,
            degrees => Some(degrees),
        }
    }

    /// Focus mode applied, if any.
    pub fn focus_mode(&self) -> Option<FocusMode> {
        *self.observed.focus_mode.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CameraDriver for TestCamera {
    fn open(&self) -> anyhow::Result<Box<dyn CameraHandle>> {
        if self.observed.fail_next_open.swap(false, Ordering::Relaxed) {
            bail!("camera is held by another process");
        }
        if self.observed.in_use.swap(true, Ordering::AcqRel) {
            bail!("camera already acquired");
        }
        self.observed.opens.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(TestCameraHandle {
            config: self.config.clone(),
            observed: self.observed.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }))
    }
}

struct TestCameraHandle {
    config: TestCameraConfig,
    observed: Arc<Observed>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CameraHandle for TestCameraHandle {
    fn sensor_orientation(&self) -> u32 {
        self.config.sensor_orientation
    }

    fn supported_focus_modes(&self) -> Vec<FocusMode> {
        self.config.focus_modes.clone()
    }

    fn set_focus_mode(&mut self, mode: FocusMode) -> anyhow::Result<()> {
        *self
            .observed
            .focus_mode
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(mode);
        Ok(())
    }

    fn set_display_orientation(&mut self, degrees: u32) -> anyhow::Result<()> {
        self.observed
            .display_orientation
            .store(degrees, Ordering::Relaxed);
        Ok(())
    }

    fn start_preview(&mut self, sink: FrameSink) -> anyhow::Result<()> {
        if self.thread.is_some() {
            bail!("preview already running");
        }
        let config = self.config.clone();
        let observed = self.observed.clone();
        let stop = self.stop.clone();

        self.thread = Some(std::thread::spawn(move || {
            let started = Instant::now();
            let interval = Duration::from_micros(1_000_000 / u64::from(config.fps.max(1)));
            let len = config
                .format
                .frame_len(config.width, config.height)
                .unwrap_or(1024);
            // Bytes is refcounted: one allocation serves every frame
            let payload = Bytes::from(vec![0x80u8; len]);

            while !stop.load(Ordering::Acquire) {
                let frame = Frame::new(payload.clone(), config.width, config.height, config.format)
                    .with_timestamp(started.elapsed().as_micros() as u64);
                sink(frame);
                observed.delivered.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(interval);
            }
            debug!("test camera delivery thread ended");
        }));
        Ok(())
    }

    fn stop_preview(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            // join: no sink call can happen once we return
            let _ = thread.join();
        }
    }

    fn autofocus(&mut self) -> anyhow::Result<()> {
        self.observed.autofocus_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for TestCameraHandle {
    fn drop(&mut self) {
        self.stop_preview();
        self.observed.in_use.store(false, Ordering::Release);
    }
}

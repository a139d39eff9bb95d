//! The owned camera resource and its lifecycle

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ScanError;
use crate::frame::Frame;

/// Receives frames on the camera's delivery thread. Must not block:
/// frame delivery runs at hardware rate and is never paused.
pub type FrameSink = Arc<dyn Fn(Frame) + Send + Sync>;

/// Focus behaviors a driver may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    /// Continuous refocus tuned for stills, preferred for scanning
    ContinuousPicture,
    /// Single sweep on demand
    Auto,
    /// Fixed-focus optics
    Fixed,
}

/// The four cardinal display rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl DisplayRotation {
    /// Rotation offset applied on top of the sensor mounting orientation.
    fn offset_degrees(self) -> i32 {
        match self {
            DisplayRotation::Deg0 => 0,
            DisplayRotation::Deg90 => -90,
            DisplayRotation::Deg180 => 180,
            DisplayRotation::Deg270 => -270,
        }
    }
}

/// Preview correction for a sensor mounted at `sensor_orientation`
/// degrees under the given display rotation, normalized to [0, 360).
pub fn display_correction(sensor_orientation: u32, rotation: DisplayRotation) -> u32 {
    (sensor_orientation as i32 + rotation.offset_degrees()).rem_euclid(360) as u32
}

/// Opens the sole hardware camera.
///
/// Implemented by the host platform; the `test-source` feature provides a
/// synthetic one. `open` fails when the camera is held elsewhere or
/// physically absent.
pub trait CameraDriver: Send + Sync {
    fn open(&self) -> anyhow::Result<Box<dyn CameraHandle>>;
}

/// An acquired camera.
///
/// Dropping the handle releases the hardware. Implementations must stop
/// frame delivery in [`stop_preview`](CameraHandle::stop_preview) (and
/// in `Drop`, for abnormal teardown paths) before the handle goes away:
/// no sink call may happen once either returns.
pub trait CameraHandle: Send {
    /// Fixed mounting orientation of the sensor, in degrees.
    fn sensor_orientation(&self) -> u32;

    /// Focus modes the hardware supports.
    fn supported_focus_modes(&self) -> Vec<FocusMode>;

    fn set_focus_mode(&mut self, mode: FocusMode) -> anyhow::Result<()>;

    fn set_display_orientation(&mut self, degrees: u32) -> anyhow::Result<()>;

    /// Begin streaming frames into `sink` at hardware rate.
    fn start_preview(&mut self, sink: FrameSink) -> anyhow::Result<()>;

    /// Stop streaming and unregister the sink. Returns only after
    /// delivery has quiesced.
    fn stop_preview(&mut self);

    /// Single best-effort autofocus pass.
    fn autofocus(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Camera configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Display rotation at startup; updated via
    /// [`CameraResource::set_display_rotation`]
    pub rotation: DisplayRotation,
    /// Focus mode requested when the hardware supports it, silently
    /// skipped otherwise
    pub preferred_focus: FocusMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rotation: DisplayRotation::Deg0,
            preferred_focus: FocusMode::ContinuousPicture,
        }
    }
}

enum CameraState {
    Unacquired,
    Streaming(Box<dyn CameraHandle>),
}

struct Inner {
    state: CameraState,
    rotation: DisplayRotation,
}

/// Owns the single camera handle.
///
/// All handle state lives behind one guard shared by the session context
/// and anyone reacting to display changes, so a `stop` can never race a
/// configuration call into a released handle. The guard is held only
/// around handle state and the driver calls themselves, never across
/// storage I/O.
pub struct CameraResource {
    driver: Arc<dyn CameraDriver>,
    preferred_focus: FocusMode,
    inner: Mutex<Inner>,
}

impl CameraResource {
    pub fn new(driver: Arc<dyn CameraDriver>, config: CameraConfig) -> Self {
        Self {
            driver,
            preferred_focus: config.preferred_focus,
            inner: Mutex::new(Inner {
                state: CameraState::Unacquired,
                rotation: config.rotation,
            }),
        }
    }

    /// Acquire, configure, and begin streaming into `sink`.
    ///
    /// Idempotent: a second `start` while streaming is a no-op. Acquire,
    /// configure, callback registration, and stream start run as one
    /// critical section, so no frame callback can observe a half-initialized
    /// handle. On failure nothing stays half-open and a later `start`
    /// reacquires cleanly.
    pub async fn start(&self, sink: FrameSink) -> Result<(), ScanError> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, CameraState::Streaming(_)) {
            debug!("camera already streaming, start ignored");
            return Ok(());
        }

        let mut handle = self
            .driver
            .open()
            .map_err(|e| ScanError::ResourceUnavailable(format!("{e:#}")))?;

        let correction = display_correction(handle.sensor_orientation(), inner.rotation);
        if let Err(e) = handle.set_display_orientation(correction) {
            // handle dropped here: release before the error is reported
            return Err(ScanError::Configuration(format!("{e:#}")));
        }
        if handle.supported_focus_modes().contains(&self.preferred_focus) {
            if let Err(e) = handle.set_focus_mode(self.preferred_focus) {
                warn!(mode = ?self.preferred_focus, "focus mode rejected: {e:#}");
            }
        }

        if let Err(e) = handle.start_preview(sink) {
            return Err(ScanError::Configuration(format!("{e:#}")));
        }

        info!(correction, "camera streaming");
        inner.state = CameraState::Streaming(handle);
        Ok(())
    }

    /// Stop streaming and release the camera. Idempotent.
    ///
    /// The frame sink is unregistered (and delivery quiesced) strictly
    /// before the handle is released.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let CameraState::Streaming(mut handle) =
            std::mem::replace(&mut inner.state, CameraState::Unacquired)
        {
            handle.stop_preview();
            drop(handle);
            info!("camera released");
        }
    }

    /// Record a display rotation change, reapplying the orientation
    /// correction immediately when streaming.
    pub async fn set_display_rotation(&self, rotation: DisplayRotation) {
        let mut inner = self.inner.lock().await;
        inner.rotation = rotation;
        if let CameraState::Streaming(handle) = &mut inner.state {
            let correction = display_correction(handle.sensor_orientation(), rotation);
            match handle.set_display_orientation(correction) {
                Ok(()) => debug!(correction, "orientation correction reapplied"),
                Err(e) => warn!("orientation update rejected: {e:#}"),
            }
        }
    }

    /// Best-effort single autofocus pass (tap-to-focus). A no-op when
    /// not streaming.
    pub async fn trigger_autofocus(&self) {
        let mut inner = self.inner.lock().await;
        if let CameraState::Streaming(handle) = &mut inner.state {
            if let Err(e) = handle.autofocus() {
                debug!("autofocus pass failed: {e:#}");
            }
        }
    }

    /// Whether the camera is currently streaming.
    pub async fn is_streaming(&self) -> bool {
        matches!(self.inner.lock().await.state, CameraState::Streaming(_))
    }
}

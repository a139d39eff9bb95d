//! Camera capture: the hardware boundary and the owned camera resource
//!
//! The physical camera is reached through the [`CameraDriver`] /
//! [`CameraHandle`] traits, implemented by the host platform.
//! [`CameraResource`] owns the acquired handle behind one guard and
//! enforces the acquire → configure → stream → release lifecycle.

pub mod camera;

#[cfg(feature = "test-source")]
pub mod test_source;

pub use camera::{
    display_correction, CameraConfig, CameraDriver, CameraHandle, CameraResource, DisplayRotation,
    FocusMode, FrameSink,
};

#[cfg(feature = "test-source")]
pub use test_source::{TestCamera, TestCameraConfig};

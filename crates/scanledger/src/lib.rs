//! scanledger: barcode capture-and-commit pipeline
//!
//! Turns a device camera into a data-entry terminal: frames stream off
//! the camera, an injected detector decodes barcode payloads, and each
//! accepted scan is durably appended as one row of a per-dataset-per-day
//! record table.
//!
//! Modules:
//! - **`capture`**: camera driver boundary and the owned camera resource
//! - **`detect`**: detector boundary, detection sink, and the frame gate
//! - **`session`**: the scan-session state machine and UI callbacks
//! - **`storage`**: record tables and the dataset-names registry
//!
//! The `test-source` feature (default) adds a synthetic camera and a
//! scripted detector so the pipeline runs without hardware.

pub mod capture;
pub mod detect;
mod error;
mod frame;
pub mod session;
pub mod storage;

pub use capture::{
    CameraConfig, CameraDriver, CameraHandle, CameraResource, DisplayRotation, FocusMode, FrameSink,
};
pub use detect::{DetectionSink, FrameDetector, FrameGate, GateControl};
pub use error::{Permission, ScanError};
pub use frame::{Frame, PixelFormat};
pub use session::{
    PermissionProbe, ScanEvents, ScanSession, ScanSessionState, StaticPermissions,
};
pub use storage::{NamesRegistry, RecordStore, RecordStoreConfig, RecordTable, StorageError};

#[cfg(feature = "test-source")]
pub use capture::{TestCamera, TestCameraConfig};
#[cfg(feature = "test-source")]
pub use detect::ScriptedDetector;

//! Error taxonomy surfaced by the scan pipeline
//!
//! Boundary traits (camera driver, detector) report failures as
//! `anyhow::Error`; the pipeline maps them into these typed variants
//! before they reach the session's callers. Every variant is recoverable:
//! the session returns to Idle and a new scan may start.

use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// A host-platform grant the pipeline needs before scanning can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Access to the device camera
    Camera,
    /// Read/write access to the record-table storage volume
    Storage,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Camera => write!(f, "camera"),
            Permission::Storage => write!(f, "storage"),
        }
    }
}

/// Failures the scan pipeline reports to its caller.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The camera is held by another process/component or physically absent.
    #[error("camera unavailable: {0}")]
    ResourceUnavailable(String),

    /// The driver rejected the preview/streaming setup.
    #[error("camera configuration rejected: {0}")]
    Configuration(String),

    /// A required grant is missing; reported before any camera work starts.
    #[error("{0} permission not granted")]
    PermissionDenied(Permission),

    /// A record-table commit failed. The scanned value is not retried
    /// automatically; the operator rescans.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

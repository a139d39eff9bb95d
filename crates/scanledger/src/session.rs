//! Scan-session state machine
//!
//! A session gates the whole pipeline: it starts the camera, unparks the
//! frame gate, and decides what happens to each detection result. Exactly
//! one value is committed per successful scan; everything else is
//! discarded. Idle is both the initial and the terminal state; sessions
//! restart indefinitely.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::capture::{CameraResource, FrameSink};
use crate::detect::{DetectionSink, FrameDetector, FrameGate, GateControl};
use crate::error::{Permission, ScanError};
use crate::storage::RecordStore;

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSessionState {
    /// No scan in progress; the preview may still be live
    Idle,
    /// Frames are being analyzed for a payload
    Scanning,
    /// A payload was accepted and its commit is in flight
    Committing,
}

/// Callbacks the surrounding application wires to its surface
/// (button state, toasts). Called from pipeline tasks; must not block.
pub trait ScanEvents: Send + Sync {
    fn on_scan_started(&self);
    fn on_scan_committed(&self, value: &str);
    fn on_scan_failed(&self, error: &ScanError);
    fn on_permission_required(&self, permission: Permission);
}

/// Reports whether a host-platform grant is present.
pub trait PermissionProbe: Send + Sync {
    fn is_granted(&self, permission: Permission) -> bool;
}

/// Probe backed by fixed grants, for hosts that resolve permissions
/// before constructing the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    pub camera: bool,
    pub storage: bool,
}

impl StaticPermissions {
    /// Everything granted.
    pub fn granted() -> Self {
        Self {
            camera: true,
            storage: true,
        }
    }
}

impl PermissionProbe for StaticPermissions {
    fn is_granted(&self, permission: Permission) -> bool {
        match permission {
            Permission::Camera => self.camera,
            Permission::Storage => self.storage,
        }
    }
}

enum State {
    Idle,
    Scanning { dataset: String },
    Committing,
}

// State machine half shared with the detection worker (the session's
// DetectionSink). Split off from ScanSession so the worker does not keep
// the public handle alive.
struct SessionShared {
    state: Mutex<State>,
    store: Arc<RecordStore>,
    events: Arc<dyn ScanEvents>,
    control: GateControl,
}

impl SessionShared {
    // Committing → Idle; leaves any other state alone (a stop/start may
    // have moved the session on while the append was in flight)
    async fn finish_commit(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, State::Committing) {
            *state = State::Idle;
        }
    }
}

#[async_trait]
impl DetectionSink for SessionShared {
    async fn on_detections(&self, payloads: Vec<String>) {
        // zero payloads: silently absorbed, session stays Scanning
        let Some(value) = payloads.into_iter().next() else {
            return;
        };

        let dataset = {
            let mut state = self.state.lock().await;
            match &*state {
                State::Scanning { dataset } => {
                    let dataset = dataset.clone();
                    // park first: at most one commit per scan session,
                    // no matter how many hits are still in the pipe
                    self.control.park();
                    *state = State::Committing;
                    dataset
                }
                // Idle or Committing: the session is not accepting hits
                _ => return,
            }
        };

        debug!(%value, dataset, "detection accepted, committing");
        match self.store.append(&dataset, &value, Utc::now()).await {
            Ok(()) => {
                self.finish_commit().await;
                info!(%value, dataset, "scan committed");
                self.events.on_scan_committed(&value);
            }
            Err(e) => {
                let error = ScanError::from(e);
                self.finish_commit().await;
                warn!("commit failed, value not recorded: {error}");
                self.events.on_scan_failed(&error);
            }
        }
    }
}

/// The scan-session handle the application drives.
pub struct ScanSession {
    camera: Arc<CameraResource>,
    gate: FrameGate,
    permissions: Arc<dyn PermissionProbe>,
    shared: Arc<SessionShared>,
}

impl ScanSession {
    /// Assemble the pipeline and spawn its detection worker.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        camera: Arc<CameraResource>,
        detector: Arc<dyn FrameDetector>,
        store: Arc<RecordStore>,
        permissions: Arc<dyn PermissionProbe>,
        events: Arc<dyn ScanEvents>,
    ) -> Self {
        let control = GateControl::new();
        let shared = Arc::new(SessionShared {
            state: Mutex::new(State::Idle),
            store,
            events,
            control: control.clone(),
        });
        let gate = FrameGate::spawn(detector, shared.clone(), control);
        Self {
            camera,
            gate,
            permissions,
            shared,
        }
    }

    /// Begin scanning into `dataset`.
    ///
    /// Requires the camera and storage grants; otherwise fails with
    /// `PermissionDenied` before any camera work. Idempotent while a scan
    /// is active. A camera failure leaves the session Idle and retryable.
    pub async fn start_scan(&self, dataset: &str) -> Result<(), ScanError> {
        for permission in [Permission::Camera, Permission::Storage] {
            if !self.permissions.is_granted(permission) {
                self.shared.events.on_permission_required(permission);
                return Err(ScanError::PermissionDenied(permission));
            }
        }

        if !matches!(*self.shared.state.lock().await, State::Idle) {
            debug!("scan already active, start ignored");
            return Ok(());
        }

        let gate = self.gate.clone();
        let sink: FrameSink = Arc::new(move |frame| {
            gate.submit(frame);
        });
        if let Err(e) = self.camera.start(sink).await {
            self.shared.events.on_scan_failed(&e);
            return Err(e);
        }

        let mut state = self.shared.state.lock().await;
        if matches!(*state, State::Idle) {
            *state = State::Scanning {
                dataset: dataset.to_string(),
            };
            self.gate.unpark();
            info!(dataset, "scan session started");
            self.shared.events.on_scan_started();
        }
        Ok(())
    }

    /// Cancel the active scan. The preview stays live; frame results are
    /// discarded. A no-op when Idle; an in-flight commit is not
    /// interrupted and finishes on its own.
    pub async fn stop_scan(&self) {
        let mut state = self.shared.state.lock().await;
        if matches!(*state, State::Scanning { .. }) {
            *state = State::Idle;
            self.gate.park();
            info!("scan session stopped");
        }
    }

    /// Force-stop the session and release the camera (screen exit).
    pub async fn close(&self) {
        self.stop_scan().await;
        self.camera.stop().await;
        info!("scan screen closed");
    }

    /// Current session state.
    pub async fn state(&self) -> ScanSessionState {
        match *self.shared.state.lock().await {
            State::Idle => ScanSessionState::Idle,
            State::Scanning { .. } => ScanSessionState::Scanning,
            State::Committing => ScanSessionState::Committing,
        }
    }
}

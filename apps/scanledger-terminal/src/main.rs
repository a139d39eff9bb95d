//! Scanledger demo terminal
//!
//! Drives the capture-and-commit pipeline end to end without hardware:
//! a synthetic camera streams frames, a scripted detector "decodes" one
//! payload per scan, and each committed value lands in a record table
//! under the configured root.
//!
//! ## Usage
//!
//! ```bash
//! # defaults: ./scanledger-data, first dataset from names.txt, 3 scans
//! scanledger-terminal
//!
//! # pick a dataset and scan count
//! SCANLEDGER_DATASET=file_2 SCANLEDGER_SCANS=10 scanledger-terminal
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use scanledger::{
    CameraConfig, CameraResource, NamesRegistry, Permission, RecordStore, RecordStoreConfig,
    ScanError, ScanEvents, ScanSession, ScriptedDetector, StaticPermissions, TestCamera,
    TestCameraConfig,
};

/// Terminal configuration from environment variables.
struct Config {
    /// Root directory for ProgramFiles/ and ExcelFiles/
    root: PathBuf,
    /// Dataset to log into; defaults to the first registry entry
    dataset: Option<String>,
    /// Number of scan sessions to run
    scans: u32,
    /// Synthetic camera frame rate
    fps: u32,
}

impl Config {
    fn from_env() -> Result<Self> {
        let root = std::env::var("SCANLEDGER_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./scanledger-data"));

        let dataset = std::env::var("SCANLEDGER_DATASET").ok();

        let scans: u32 = std::env::var("SCANLEDGER_SCANS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let fps: u32 = std::env::var("SCANLEDGER_FPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            root,
            dataset,
            scans,
            fps,
        })
    }
}

/// Bridges pipeline callbacks to the terminal: logs everything and
/// forwards committed values to the main loop.
struct TerminalEvents {
    committed_tx: mpsc::UnboundedSender<String>,
}

impl ScanEvents for TerminalEvents {
    fn on_scan_started(&self) {
        info!("scanning...");
    }

    fn on_scan_committed(&self, value: &str) {
        // the toast equivalent
        info!("scanned: {value}");
        let _ = self.committed_tx.send(value.to_string());
    }

    fn on_scan_failed(&self, error: &ScanError) {
        warn!("scan failed: {error}");
    }

    fn on_permission_required(&self, permission: Permission) {
        warn!("grant the {permission} permission and retry");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scanledger=info".parse()?)
                .add_directive("scanledger_terminal=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;

    info!("Scanledger terminal starting");
    info!("  Root: {:?}", config.root);
    info!("  Scans: {}", config.scans);
    info!("  Camera: synthetic @ {}fps", config.fps);

    // Dataset names come from the operator-editable registry file
    let registry = NamesRegistry::new(&config.root);
    let names = registry
        .load_or_init()
        .context("failed to load dataset names")?;
    info!("  Datasets: {}", names.join(", "));

    let dataset = match config.dataset {
        Some(name) => {
            if !names.contains(&name) {
                bail!(
                    "dataset {:?} is not listed in {:?}; add it there first",
                    name,
                    registry.path()
                );
            }
            name
        }
        None => names
            .first()
            .cloned()
            .context("names registry is empty")?,
    };
    info!("  Logging into dataset {:?}", dataset);

    // Assemble the pipeline: synthetic camera, scripted detector,
    // real record store
    let camera = Arc::new(TestCamera::new(TestCameraConfig {
        fps: config.fps,
        ..Default::default()
    }));
    let resource = Arc::new(CameraResource::new(camera, CameraConfig::default()));
    let detector = Arc::new(ScriptedDetector::new());
    let store = Arc::new(RecordStore::new(RecordStoreConfig::rooted_at(&config.root)));

    let (committed_tx, mut committed_rx) = mpsc::unbounded_channel();
    let session = ScanSession::spawn(
        resource.clone(),
        detector.clone(),
        store.clone(),
        Arc::new(StaticPermissions::granted()),
        Arc::new(TerminalEvents { committed_tx }),
    );

    let mut committed = 0u32;
    for scan in 1..=config.scans {
        // one payload queued per session: the scripted stand-in for
        // holding a barcode in front of the lens
        detector.push([format!("PKG-{scan:04}")]);
        session.start_scan(&dataset).await?;

        if scan == 1 {
            // tap-to-focus pass, as an operator would
            resource.trigger_autofocus().await;
        }

        match tokio::time::timeout(Duration::from_secs(5), committed_rx.recv()).await {
            Ok(Some(value)) => {
                committed += 1;
                info!("scan {scan}/{} committed {value:?}", config.scans);
            }
            Ok(None) => bail!("event channel closed unexpectedly"),
            Err(_) => {
                warn!("scan {scan} timed out waiting for a commit");
                session.stop_scan().await;
            }
        }
    }

    session.close().await;

    let table = store
        .read_table(&dataset, Utc::now().date_naive())
        .context("failed to read back today's table")?;
    info!(
        "Terminal shutting down. {} commits this run, {} rows total in {:?}",
        committed,
        table.values.len(),
        store.table_path(&dataset, Utc::now().date_naive()),
    );

    Ok(())
}

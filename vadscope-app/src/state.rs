//! Shared per-process state for the axum host.

use std::sync::Arc;

use vadscope_core::{AudioLoader, DetectorHandle};

/// Built once in `main`, cloned into every request via `axum::extract::State`.
///
/// The detector is the one long-lived object (model weights load once per
/// process); everything derived from an upload stays request-local.
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<AudioLoader>,
    pub detector: DetectorHandle,
}

impl AppState {
    pub fn new(loader: AudioLoader, detector: DetectorHandle) -> Self {
        Self {
            loader: Arc::new(loader),
            detector,
        }
    }
}

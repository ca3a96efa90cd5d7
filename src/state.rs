//! Service readiness state
//!
//! One `AppState` is built by the boot sequence before the listener starts
//! and shared read-only with every handler. Nothing writes it afterwards, so
//! request-time reads need no locking.

use std::path::Path;
use std::sync::Arc;

use crate::engine::ChatModel;

/// Readiness snapshot plus the engine handle, built exactly once per process
pub struct AppState {
    /// Whether the engine loaded successfully
    pub model_loaded: bool,
    /// Failure description from the boot attempt, when degraded
    pub error: Option<String>,
    /// Canonical artifact location for the lifetime of the process
    pub model_path: String,
    /// Model name reported in chat responses
    pub model_name: String,
    /// Engine handle; absent while degraded
    pub engine: Option<Arc<dyn ChatModel>>,
}

impl AppState {
    /// Successful boot: the engine is usable at `model_path`.
    pub fn ready(engine: Arc<dyn ChatModel>, model_path: &Path) -> Self {
        Self {
            model_loaded: true,
            error: None,
            model_path: model_path.display().to_string(),
            model_name: model_name_of(model_path),
            engine: Some(engine),
        }
    }

    /// Failed boot: the HTTP surface stays live, chat fails fast with `reason`.
    pub fn degraded(reason: impl Into<String>, model_path: &Path) -> Self {
        Self {
            model_loaded: false,
            error: Some(reason.into()),
            model_path: model_path.display().to_string(),
            model_name: model_name_of(model_path),
            engine: None,
        }
    }
}

fn model_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

//! Boot sequence
//!
//! Resolves the model location, makes sure the weights exist there, loads the
//! engine, and records the outcome. Runs exactly once, synchronously, before
//! the server accepts traffic; the worst case is a live but degraded service,
//! never a dead process. Nothing re-triggers loading afterwards.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{Config, DEFAULT_MODEL_FILENAME};
use crate::engine::{ChatModel, EngineError, LlamaEngine};
use crate::provision::fetch::{self, FetchOutcome};
use crate::provision::paths;
use crate::state::AppState;

/// Run the full boot sequence with the real llama.cpp engine.
pub async fn boot(config: &Config) -> AppState {
    boot_with(config, |path, n_ctx, n_threads| {
        LlamaEngine::load(path, n_ctx, n_threads)
            .map(|engine| Arc::new(engine) as Arc<dyn ChatModel>)
    })
    .await
}

/// Boot with an injectable engine constructor.
///
/// Resolve location → select target → ensure artifact → construct engine.
/// Every failure along the way turns into a degraded state carrying the
/// reason; the realized path is canonical for the rest of the process.
pub async fn boot_with<F>(config: &Config, load_engine: F) -> AppState
where
    F: FnOnce(&Path, u32, i32) -> Result<Arc<dyn ChatModel>, EngineError>,
{
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let fallback = std::env::temp_dir().join("modelgate").join(DEFAULT_MODEL_FILENAME);

    let requested = paths::resolve(
        config.local_model_path.as_deref(),
        config.model_path.as_deref(),
        &base_dir,
        &fallback,
    );

    let file_name = requested
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_MODEL_FILENAME));
    let temp_candidate = std::env::temp_dir().join("modelgate").join(&file_name);
    let cwd_candidate = base_dir.join("models").join(&file_name);

    let target = paths::select_target(&requested, &temp_candidate, &cwd_candidate);
    if target != requested {
        tracing::warn!(
            "Model will live at {} instead of {}",
            target.display(),
            requested.display()
        );
    }

    let realized = match fetch::ensure(&target, &config.model_url, progress_logger()).await {
        FetchOutcome::AlreadyPresent(path) => path,
        FetchOutcome::Downloaded(path, bytes) => {
            tracing::info!("Fetched model ({}) to {}", fetch::format_size(bytes), path.display());
            path
        }
        FetchOutcome::Failed(reason) => {
            tracing::error!("Could not obtain model: {}", reason);
            return AppState::degraded(reason, &target);
        }
    };

    match load_engine(&realized, config.n_ctx, config.n_threads) {
        Ok(engine) => {
            tracing::info!("Engine ready with {}", realized.display());
            AppState::ready(engine, &realized)
        }
        Err(e) => {
            tracing::error!("Engine failed to load: {}", e);
            AppState::degraded(e.to_string(), &realized)
        }
    }
}

/// Log download progress at 10-percentage-point steps.
fn progress_logger() -> impl Fn(u64, u64) + Send {
    let last_step = AtomicU64::new(0);
    move |downloaded, total| {
        if total == 0 {
            return;
        }
        let step = downloaded * 100 / total / 10;
        if step > last_step.swap(step, Ordering::Relaxed) {
            tracing::info!("Downloading model: {}%", step * 10);
        }
    }
}

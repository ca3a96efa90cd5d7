//! Model path resolution
//!
//! Figures out where the weights file should live: layered configuration
//! first, then a degradation ladder of writable destinations for deployments
//! with read-only or ephemeral filesystems.

use std::fs;
use std::path::{Path, PathBuf};

/// Resolve the requested model location from layered configuration.
///
/// A local override wins only when the file actually exists; a configured
/// path is returned whether or not it exists (the caller creates it); with
/// neither set, the fixed temp-area fallback is used. Relative paths are
/// interpreted against `base_dir`. Always returns a path.
pub fn resolve(
    local_override: Option<&str>,
    configured: Option<&str>,
    base_dir: &Path,
    fallback: &Path,
) -> PathBuf {
    if let Some(raw) = local_override {
        let candidate = absolutize(raw, base_dir);
        if candidate.is_file() {
            tracing::info!("Using local model override: {}", candidate.display());
            return candidate;
        }
        tracing::warn!(
            "LOCAL_MODEL_PATH is set but {} does not exist, ignoring",
            candidate.display()
        );
    }

    if let Some(raw) = configured {
        return absolutize(raw, base_dir);
    }

    fallback.to_path_buf()
}

fn absolutize(raw: &str, base_dir: &Path) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Probe whether the process can write under `dir`.
///
/// Creates the directory tree if absent, then writes and removes a probe
/// file. Any I/O failure (permissions, read-only filesystem, disk full)
/// becomes `false`; this never propagates an error. A later write can still
/// fail if the filesystem changes underneath us, which the fetcher handles
/// as its own failure.
pub fn is_writable(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }

    let probe = dir.join(".write_probe");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Pick the actual destination for the artifact.
///
/// Three fixed tiers: an existing file is consumed in place without any
/// probe; otherwise the preferred destination if its directory is writable;
/// otherwise the temp candidate if writable; otherwise the cwd candidate
/// with no probe at all, as a last resort whose eventual fetch failure is
/// diagnosable.
pub fn select_target(preferred: &Path, temp_candidate: &Path, cwd_candidate: &Path) -> PathBuf {
    if preferred.is_file() {
        return preferred.to_path_buf();
    }

    if is_writable(&parent_dir(preferred)) {
        return preferred.to_path_buf();
    }
    tracing::warn!(
        "{} is not writable, trying temp area",
        parent_dir(preferred).display()
    );

    if is_writable(&parent_dir(temp_candidate)) {
        return temp_candidate.to_path_buf();
    }
    tracing::warn!(
        "{} is not writable either, falling back to working directory",
        parent_dir(temp_candidate).display()
    );

    cwd_candidate.to_path_buf()
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_override_wins_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        fs::write(&model, b"weights").unwrap();

        let resolved = resolve(
            Some(model.to_str().unwrap()),
            Some("/somewhere/else.gguf"),
            dir.path(),
            Path::new("/tmp/fallback.gguf"),
        );
        assert_eq!(resolved, model);
    }

    #[test]
    fn test_resolve_missing_override_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve(
            Some("does-not-exist.gguf"),
            Some("configured.gguf"),
            dir.path(),
            Path::new("/tmp/fallback.gguf"),
        );
        assert_eq!(resolved, dir.path().join("configured.gguf"));
    }

    #[test]
    fn test_resolve_configured_path_need_not_exist() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve(
            None,
            Some("models/model.gguf"),
            dir.path(),
            Path::new("/tmp/fallback.gguf"),
        );
        assert_eq!(resolved, dir.path().join("models/model.gguf"));
    }

    #[test]
    fn test_resolve_falls_back_when_nothing_set() {
        let fallback = Path::new("/tmp/fallback/model.gguf");
        let resolved = resolve(None, None, Path::new("/base"), fallback);
        assert_eq!(resolved, fallback);
    }

    #[test]
    fn test_is_writable_creates_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        assert!(is_writable(&nested));
        assert!(nested.is_dir());
        assert!(!nested.join(".write_probe").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_is_writable_false_on_read_only_dir() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        assert!(!is_writable(&locked.join("models")));

        // restore so the tempdir can be removed
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_select_target_existing_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.gguf");
        fs::write(&model, b"weights").unwrap();

        let target = select_target(
            &model,
            &dir.path().join("tmp/model.gguf"),
            &dir.path().join("cwd/model.gguf"),
        );
        assert_eq!(target, model);
    }

    #[test]
    fn test_select_target_prefers_writable_preferred() {
        let dir = tempfile::tempdir().unwrap();
        let preferred = dir.path().join("models/model.gguf");
        let target = select_target(
            &preferred,
            &dir.path().join("tmp/model.gguf"),
            &dir.path().join("cwd/model.gguf"),
        );
        assert_eq!(target, preferred);
    }

    #[cfg(unix)]
    #[test]
    fn test_select_target_falls_back_to_temp() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let temp_candidate = dir.path().join("tmp/model.gguf");
        let target = select_target(
            &locked.join("models/model.gguf"),
            &temp_candidate,
            &dir.path().join("cwd/model.gguf"),
        );
        assert_eq!(target, temp_candidate);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_select_target_last_resort_is_unprobed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        let cwd_candidate = locked.join("also-locked/model.gguf");
        let target = select_target(
            &locked.join("models/model.gguf"),
            &locked.join("tmp/model.gguf"),
            &cwd_candidate,
        );
        // no probe on the last tier, the path comes back as-is
        assert_eq!(target, cwd_candidate);

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

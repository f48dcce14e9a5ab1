use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::APP_NAME;

/// Absolute, existing directories the lookup flow works in.
#[derive(Debug, Clone)]
pub struct WorkPaths {
    pub corpus_dir: PathBuf,
    pub output_dir: PathBuf,
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to get current directory")?
        .join(path))
}

/// Make both directories absolute; the corpus must exist, the output root is
/// created if needed.
pub fn resolve_work_paths(corpus_dir: &Path, output_dir: &Path) -> Result<WorkPaths> {
    let corpus_dir = absolute(corpus_dir)?;
    if !corpus_dir.is_dir() {
        anyhow::bail!("Corpus directory does not exist: {corpus_dir:?}");
    }

    let output_dir = absolute(output_dir)?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {output_dir:?}"))?;

    Ok(WorkPaths {
        corpus_dir,
        output_dir,
    })
}

/// Compute the XDG-compliant log file path.
/// Uses `state_dir` on platforms that have it, falls back to `cache_dir`.
pub fn resolve_log_path() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::cache_dir)
        .context("Could not determine state or cache directory")?;

    let log_dir = base.join(APP_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {log_dir:?}"))?;

    Ok(log_dir.join(format!("{APP_NAME}.log")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_work_paths_creates_output() {
        let tmp = TempDir::new().unwrap();
        let corpus = tmp.path().join("pdfs");
        fs::create_dir_all(&corpus).unwrap();
        let output = tmp.path().join("out").join("sessions");

        let paths = resolve_work_paths(&corpus, &output).unwrap();

        assert_eq!(paths.corpus_dir, corpus);
        assert!(paths.output_dir.is_dir());
    }

    #[test]
    fn test_missing_corpus_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_work_paths(&tmp.path().join("nope"), tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Corpus directory does not exist"));
    }

    #[test]
    fn test_resolve_log_path() {
        let log_path = resolve_log_path().unwrap();
        assert!(log_path.ends_with("pagefinder.log"));
        assert!(log_path.parent().unwrap().exists());
    }
}

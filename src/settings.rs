use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::activity::{DEFAULT_IDLE_CHECK_INTERVAL, DEFAULT_IDLE_THRESHOLD};
use crate::session::{
    DEFAULT_SELECTION_TIMEOUT, DEFAULT_SESSION_TIMEOUT, DEFAULT_SWEEP_INTERVAL, Timeouts,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
pub const APP_NAME: &str = "pagefinder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Root searched for PDFs
    #[serde(default = "default_corpus_dir")]
    pub corpus_dir: PathBuf,

    /// Where per-session render directories are created
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default = "default_selection_timeout_secs")]
    pub selection_timeout_secs: u64,

    #[serde(default = "default_idle_threshold_secs")]
    pub idle_threshold_secs: u64,

    #[serde(default = "default_idle_check_secs")]
    pub idle_check_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("./pdfs")
}

fn default_output_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
        .join("output")
}

fn default_session_timeout_secs() -> u64 {
    DEFAULT_SESSION_TIMEOUT.as_secs()
}

fn default_selection_timeout_secs() -> u64 {
    DEFAULT_SELECTION_TIMEOUT.as_secs()
}

fn default_idle_threshold_secs() -> u64 {
    DEFAULT_IDLE_THRESHOLD.as_secs()
}

fn default_idle_check_secs() -> u64 {
    DEFAULT_IDLE_CHECK_INTERVAL.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            corpus_dir: default_corpus_dir(),
            output_dir: default_output_dir(),
            session_timeout_secs: default_session_timeout_secs(),
            selection_timeout_secs: default_selection_timeout_secs(),
            idle_threshold_secs: default_idle_threshold_secs(),
            idle_check_secs: default_idle_check_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            session: Duration::from_secs(self.session_timeout_secs),
            selection: Duration::from_secs(self.selection_timeout_secs),
        }
    }

    #[must_use]
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    /// Never zero, a zero interval would spin the checker thread.
    #[must_use]
    pub fn idle_check_interval(&self) -> Duration {
        Duration::from_secs(self.idle_check_secs.max(1))
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// `log_level` as a filter, `Info` when unrecognised.
    #[must_use]
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            log::LevelFilter::Info
        })
    }
}

#[must_use]
pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from `path`, or from the per-user config file when `None`.
///
/// A missing file is written out with defaults. Unreadable or malformed
/// files are logged and the defaults are used.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match preferred_config_path() {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using default settings");
                return Settings::default();
            }
        },
    };

    if !path.exists() {
        info!("Settings file not found, creating with defaults at {path:?}");
        let settings = Settings::default();
        save_settings_to_file(&settings, &path);
        return settings;
    }

    load_settings_from_path(&path).unwrap_or_default()
}

fn load_settings_from_path(path: &Path) -> Option<Settings> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
            return None;
        }
    };

    match serde_yaml::from_str::<Settings>(&content) {
        Ok(mut settings) => {
            debug!("Loaded settings from {path:?}");
            if settings.version < CURRENT_VERSION {
                migrate_settings(&mut settings);
                save_settings_to_file(&settings, path);
            }
            Some(settings)
        }
        Err(e) => {
            error!("Failed to parse settings file {path:?}: {e}");
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let body = match serde_yaml::to_string(settings) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize settings: {e}");
            return;
        }
    };

    match fs::write(path, format!("{SETTINGS_HEADER}{body}")) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# pagefinder settings
# ============================================================================
# corpus_dir            directory searched (recursively) for PDFs
# output_dir            per-session render output, removed when a session ends
# *_secs                timeouts and check intervals, in seconds
# log_level             off, error, warn, info, debug or trace

"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.yaml");

        let settings = load_settings(Some(&path));

        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        assert_eq!(load_settings(Some(&path)), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "corpus_dir: /srv/pdfs\nsession_timeout_secs: 30\n").unwrap();

        let settings = load_settings(Some(&path));

        assert_eq!(settings.corpus_dir, PathBuf::from("/srv/pdfs"));
        assert_eq!(settings.timeouts().session, Duration::from_secs(30));
        assert_eq!(settings.timeouts().selection, DEFAULT_SELECTION_TIMEOUT);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "session_timeout_secs: [not, a, number]\n").unwrap();

        assert_eq!(load_settings(Some(&path)), Settings::default());
    }

    #[test]
    fn old_version_is_migrated_and_rewritten() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yaml");
        fs::write(&path, "version: 0\n").unwrap();

        let settings = load_settings(Some(&path));

        assert_eq!(settings.version, CURRENT_VERSION);
        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains(&format!("version: {CURRENT_VERSION}")));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let settings = Settings {
            idle_check_secs: 0,
            sweep_interval_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.idle_check_interval(), Duration::from_secs(1));
        assert_eq!(settings.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn log_level_parsing() {
        let mut settings = Settings::default();
        settings.log_level = "debug".to_string();
        assert_eq!(settings.level_filter(), log::LevelFilter::Debug);

        settings.log_level = "chatty".to_string();
        assert_eq!(settings.level_filter(), log::LevelFilter::Info);
    }
}

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "DOCARCHIVE_CONFIG";
pub const PATHS_ENV_VAR: &str = "DOCARCHIVE_PATHS";

/// Directory names that operating systems and NAS boxes drop into shared
/// folders. Never treated as documents.
pub const OS_METADATA_DIRS: &[&str] = &[
    "@eaDir",
    "__MACOSX",
    "$RECYCLE.BIN",
    "System Volume Information",
    "lost+found",
    "#recycle",
];

/// Runtime configuration for the archive.
///
/// Every field has a default, so an empty TOML file (or no file at all) is a
/// valid configuration; only `document_paths` has to be provided for the
/// archive to do anything useful.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Semicolon-delimited list of directory roots to scan and search.
    pub document_paths: String,
    /// Upper bound on the number of findings a search returns.
    pub max_findings: usize,
    /// Whether the periodic scan task is registered at all.
    pub scan_enabled: bool,
    pub graphicsmagick_bin: PathBuf,
    pub tesseract_bin: PathBuf,
    pub pdftoppm_bin: PathBuf,
    /// Delay between the end of one scan cycle and the start of the next.
    pub polling_interval_secs: u64,
    /// Delay before the first scan cycle.
    pub initial_delay_secs: u64,
    /// Look-back window for the "newest documents" view.
    pub newest_window_hours: u64,
    /// Upper bound for a single external tool invocation. 0 disables it.
    pub tool_timeout_secs: u64,
    /// Extra file-name globs excluded from the scan.
    pub exclude: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_paths: String::new(),
            max_findings: 100,
            scan_enabled: true,
            graphicsmagick_bin: PathBuf::from("gm"),
            tesseract_bin: PathBuf::from("tesseract"),
            pdftoppm_bin: PathBuf::from("pdftoppm"),
            polling_interval_secs: 60,
            initial_delay_secs: 10,
            newest_window_hours: 48,
            tool_timeout_secs: 600,
            exclude: Vec::new(),
        }
    }
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the configuration from, in order of priority:
    /// 1. An explicit path (from --config)
    /// 2. The DOCARCHIVE_CONFIG environment variable
    /// 3. `$XDG_CONFIG_HOME/docarchive/config.toml`, if it exists
    /// 4. Built-in defaults
    ///
    /// The DOCARCHIVE_PATHS environment variable, when set, replaces
    /// `document_paths` from whichever source won.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = explicit {
            Self::load(path)?
        } else if let Ok(val) = std::env::var(CONFIG_ENV_VAR) {
            Self::load(Path::new(&val))?
        } else if let Some(path) =
            xdg::BaseDirectories::with_prefix("docarchive")
                .find_config_file("config.toml")
        {
            Self::load(&path)?
        } else {
            Self::default()
        };

        if let Ok(paths) = std::env::var(PATHS_ENV_VAR) {
            config.document_paths = paths;
        }

        Ok(config)
    }

    /// The configured roots, in declaration order.
    pub fn roots(&self) -> Vec<PathBuf> {
        split_roots(&self.document_paths)
    }

    /// Built-in OS metadata directories plus the user's `exclude` globs.
    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for name in OS_METADATA_DIRS {
            builder.add(Glob::new(name)?);
        }
        for pattern in &self.exclude {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn newest_window(&self) -> Duration {
        Duration::from_secs(self.newest_window_hours * 60 * 60)
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0)
            .then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// Split a semicolon-delimited root list, dropping blank segments.
pub fn split_roots(paths: &str) -> Vec<PathBuf> {
    paths
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

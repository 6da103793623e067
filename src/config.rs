//! TOML configuration for floodwatch.
//!
//! Layered lookup: an explicit path, the `FLOODWATCH_CONFIG` environment
//! variable, `./floodwatch.toml`, `/etc/floodwatch/floodwatch.toml`, and
//! finally compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::DetectError;

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "FLOODWATCH_CONFIG";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the floodwatch process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a resolved configuration came from, kept so the outcome can be
/// logged once the tracing subscriber (itself configured from this file) is
/// installed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOrigin {
    /// File the configuration was loaded from; `None` means defaults.
    pub path: Option<PathBuf>,
    /// Candidates that existed but failed to load, with the error.
    pub skipped: Vec<(PathBuf, String)>,
}

impl ConfigOrigin {
    pub fn log(&self) {
        for (path, error) in &self.skipped {
            warn!(path = %path.display(), %error, "config file could not be loaded, trying fallback");
        }
        match &self.path {
            Some(path) => info!(path = %path.display(), "loaded floodwatch configuration"),
            None => debug!("no config file found, using compiled-in defaults"),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Try the environment override and the standard locations, falling back
    /// to defaults when nothing loads.
    pub fn load_or_default() -> (Self, ConfigOrigin) {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_first(
            env_path,
            &[
                PathBuf::from("floodwatch.toml"),
                PathBuf::from("/etc/floodwatch/floodwatch.toml"),
            ],
        )
    }

    /// The override is always attempted; the standard locations only when
    /// they exist.
    fn load_first(env_path: Option<PathBuf>, candidates: &[PathBuf]) -> (Self, ConfigOrigin) {
        let mut origin = ConfigOrigin::default();

        let existing = candidates.iter().filter(|p| p.exists()).cloned();
        for path in env_path.into_iter().chain(existing) {
            match Self::load(&path) {
                Ok(cfg) => {
                    origin.path = Some(path);
                    return (cfg, origin);
                }
                Err(e) => origin.skipped.push((path, format!("{:#}", e))),
            }
        }

        (Self::default(), origin)
    }

    /// Resolve the configuration for the CLI: an explicit path must load.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, ConfigOrigin)> {
        match explicit {
            Some(path) => {
                let config = Self::load(path)?;
                let origin = ConfigOrigin {
                    path: Some(path.to_path_buf()),
                    skipped: Vec::new(),
                };
                Ok((config, origin))
            }
            None => Ok(Self::load_or_default()),
        }
    }

    pub fn validate(&self) -> Result<(), DetectError> {
        self.detector.validate()
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Detection thresholds and window sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of trailing points forming the baseline for each signal.
    pub window_size: usize,
    /// Minimum `max(|z_rps|, |z_bps|)` that raises a candidate.
    pub z_threshold: f64,
    /// Absolute requests/sec that raises a candidate regardless of baseline.
    pub rps_hard_threshold: f64,
    /// Absolute bytes/sec that raises a candidate regardless of baseline.
    pub bps_hard_threshold: f64,
    /// Consecutive candidates required before a point counts as anomalous.
    pub min_consecutive_points: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 30,
            z_threshold: 3.0,
            rps_hard_threshold: 1200.0,
            bps_hard_threshold: 80_000_000.0,
            min_consecutive_points: 3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), DetectError> {
        if self.window_size == 0 {
            return Err(invalid("window_size", "must be at least 1"));
        }
        if self.min_consecutive_points == 0 {
            return Err(invalid("min_consecutive_points", "must be at least 1"));
        }
        for (field, value) in [
            ("z_threshold", self.z_threshold),
            ("rps_hard_threshold", self.rps_hard_threshold),
            ("bps_hard_threshold", self.bps_hard_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, &format!("must be a positive number, got {}", value)));
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> DetectError {
    DetectError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Synthetic traffic producer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Chance per idle second that an attack burst starts.
    pub ddos_probability: f64,
    /// Delay between produced samples in the live service.
    pub interval_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            ddos_probability: 0.08,
            interval_ms: 1000,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Analysis pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Number of most recent points replayed per pass.
    pub limit: usize,
    /// Delay between live analysis passes.
    pub interval_ms: u64,
    /// Analysis rows re-written per live pass.
    pub persist_tail: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            limit: 600,
            interval_ms: 2000,
            persist_tail: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the dashboard/API listener.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("storage/floodwatch.db"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Configuration for trafficast.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> explicit overrides. Configuration is
//! loaded from `~/.config/trafficast/config.toml` and/or `.trafficast/config.toml`
//! in the workspace directory.

use crate::error::ConfigError;
use crate::features::encode::UnknownCategoryPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// Reference dataset settings.
    #[serde(default)]
    pub data: DataConfig,
    /// Predictor artifact settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Request-time prediction settings.
    #[serde(default)]
    pub prediction: PredictionConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TrafficConfig {
    /// Resolve a configured path against the workspace root.
    pub fn resolve(workspace: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            workspace.join(path)
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.prediction.validate()
    }
}

/// Reference dataset configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file the schema reference is built from.
    #[serde(default = "default_reference_path")]
    pub reference_path: PathBuf,
    /// Reference rows shown as the sample upload format.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            reference_path: default_reference_path(),
            sample_rows: default_sample_rows(),
        }
    }
}

fn default_reference_path() -> PathBuf {
    PathBuf::from("data/Traffic_Volume.csv")
}

fn default_sample_rows() -> usize {
    5
}

/// Predictor artifact configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// JSON conformal model artifact.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
        }
    }
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/traffic_volume.json")
}

/// Prediction request configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Miscoverage used when a request does not name one.
    #[serde(default = "default_alpha")]
    pub default_alpha: f64,
    #[serde(default = "default_min_alpha")]
    pub min_alpha: f64,
    #[serde(default = "default_max_alpha")]
    pub max_alpha: f64,
    /// Grid spacing for accepted alphas, counted from `min_alpha`.
    #[serde(default = "default_alpha_step")]
    pub alpha_step: f64,
    /// Handling of categorical values missing from the reference vocabulary.
    #[serde(default)]
    pub unknown_categories: UnknownCategoryPolicy,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            default_alpha: default_alpha(),
            min_alpha: default_min_alpha(),
            max_alpha: default_max_alpha(),
            alpha_step: default_alpha_step(),
            unknown_categories: UnknownCategoryPolicy::default(),
        }
    }
}

fn default_alpha() -> f64 {
    0.1
}

fn default_min_alpha() -> f64 {
    0.01
}

fn default_max_alpha() -> f64 {
    0.5
}

fn default_alpha_step() -> f64 {
    0.01
}

/// Slack, in steps, absorbing decimal alphas that are not exact in binary.
const ALPHA_GRID_TOLERANCE: f64 = 1e-6;

impl PredictionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range_ok =
            self.min_alpha > 0.0 && self.min_alpha <= self.max_alpha && self.max_alpha < 1.0;
        if !range_ok {
            return Err(ConfigError::Invalid(format!(
                "alpha range [{}, {}] must lie within (0, 1)",
                self.min_alpha, self.max_alpha
            )));
        }
        if self.alpha_step.is_nan() || self.alpha_step <= 0.0 {
            return Err(ConfigError::Invalid(
                "alpha_step must be positive".to_string(),
            ));
        }
        self.check_alpha(self.default_alpha).map(|_| ())
    }

    /// Accept `alpha` only inside the configured range and on the
    /// `alpha_step` grid starting at `min_alpha`.
    pub fn check_alpha(&self, alpha: f64) -> Result<f64, ConfigError> {
        if !(alpha >= self.min_alpha && alpha <= self.max_alpha) {
            return Err(ConfigError::AlphaOutOfRange {
                alpha,
                min: self.min_alpha,
                max: self.max_alpha,
            });
        }
        let steps = (alpha - self.min_alpha) / self.alpha_step;
        if (steps - steps.round()).abs() > ALPHA_GRID_TOLERANCE {
            return Err(ConfigError::AlphaOffStep {
                alpha,
                step: self.alpha_step,
                min: self.min_alpha,
            });
        }
        Ok(alpha)
    }

    /// The requested alpha, or the default when none was given.
    pub fn resolve_alpha(&self, requested: Option<f64>) -> Result<f64, ConfigError> {
        self.check_alpha(requested.unwrap_or(self.default_alpha))
    }
}

/// Log output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write JSON logs to daily rolling files.
    #[serde(default = "default_true")]
    pub json_file: bool,
    /// Directory for log files (platform data dir when unset).
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_file: true,
            directory: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "trafficast", "trafficast")
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".trafficast").join("config.toml")
}

/// Default directory for log files.
pub fn default_log_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `TRAFFICAST_`)
/// 3. Extra config file (e.g. `--config`)
/// 4. Workspace-local config (`.trafficast/config.toml`)
/// 5. User config (`~/.config/trafficast/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    extra_file: Option<&Path>,
    overrides: Option<&TrafficConfig>,
) -> Result<TrafficConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(TrafficConfig::default()));

    // User-level config
    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = extra_file {
        figment = figment.merge(Toml::file(path));
    }

    // Environment variables (TRAFFICAST_PREDICTION__DEFAULT_ALPHA, etc.)
    figment = figment.merge(Env::prefixed("TRAFFICAST_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    let config: TrafficConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

/// Check whether any trafficast configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs() {
        if dirs.config_dir().join("config.toml").exists() {
            return true;
        }
    }

    if let Some(ws) = workspace {
        if workspace_config_path(ws).exists() {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrafficConfig::default();
        assert_eq!(config.data.sample_rows, 5);
        assert_eq!(config.prediction.default_alpha, 0.1);
        assert_eq!(config.prediction.min_alpha, 0.01);
        assert_eq!(config.prediction.max_alpha, 0.5);
        assert_eq!(
            config.prediction.unknown_categories,
            UnknownCategoryPolicy::ZeroFill
        );
        assert!(config.logging.json_file);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = TrafficConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: TrafficConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_check_alpha() {
        let prediction = PredictionConfig::default();
        assert_eq!(prediction.check_alpha(0.05).unwrap(), 0.05);
        assert!(matches!(
            prediction.check_alpha(0.6),
            Err(ConfigError::AlphaOutOfRange { .. })
        ));
        assert!(prediction.check_alpha(0.001).is_err());
        assert_eq!(prediction.resolve_alpha(None).unwrap(), 0.1);
        assert_eq!(prediction.resolve_alpha(Some(0.2)).unwrap(), 0.2);
    }

    #[test]
    fn test_alpha_must_sit_on_step_grid() {
        let prediction = PredictionConfig::default();
        for alpha in [0.01, 0.07, 0.13, 0.29, 0.5] {
            assert_eq!(prediction.check_alpha(alpha).unwrap(), alpha);
        }
        assert!(matches!(
            prediction.check_alpha(0.055),
            Err(ConfigError::AlphaOffStep { step, .. }) if step == 0.01
        ));
        assert!(prediction.resolve_alpha(Some(0.123)).is_err());

        let coarse = PredictionConfig {
            alpha_step: 0.05,
            default_alpha: 0.12,
            ..PredictionConfig::default()
        };
        assert!(coarse.check_alpha(0.06).is_ok());
        assert!(coarse.check_alpha(0.1).is_err());
        assert!(matches!(
            coarse.validate(),
            Err(ConfigError::AlphaOffStep { .. })
        ));
    }

    #[test]
    fn test_invalid_alpha_range() {
        let mut prediction = PredictionConfig::default();
        prediction.max_alpha = 1.2;
        assert!(prediction.validate().is_err());

        let mut prediction = PredictionConfig::default();
        prediction.default_alpha = 0.9;
        assert!(prediction.validate().is_err());
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = TrafficConfig::default();
        overrides.prediction.default_alpha = 0.2;
        overrides.prediction.unknown_categories = UnknownCategoryPolicy::Reject;

        let config = load_config(None, None, Some(&overrides)).unwrap();
        assert_eq!(config.prediction.default_alpha, 0.2);
        assert_eq!(
            config.prediction.unknown_categories,
            UnknownCategoryPolicy::Reject
        );
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".trafficast");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[data]
reference_path = "ref/volumes.csv"

[prediction]
default_alpha = 0.05
unknown_categories = "reject"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert_eq!(config.data.reference_path, PathBuf::from("ref/volumes.csv"));
        assert_eq!(config.data.sample_rows, 5);
        assert_eq!(config.prediction.default_alpha, 0.05);
        assert_eq!(
            config.prediction.unknown_categories,
            UnknownCategoryPolicy::Reject
        );
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[prediction]\ndefault_alpha = 0.75\n").unwrap();
        assert!(load_config(None, Some(&path), None).is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let ws = Path::new("/srv/traffic");
        assert_eq!(
            TrafficConfig::resolve(ws, Path::new("data/ref.csv")),
            PathBuf::from("/srv/traffic/data/ref.csv")
        );
        assert_eq!(
            TrafficConfig::resolve(ws, Path::new("/abs/model.json")),
            PathBuf::from("/abs/model.json")
        );
    }
}

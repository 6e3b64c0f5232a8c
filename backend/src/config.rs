use serde::{Deserialize, Serialize};
use shared::ClassLabel;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/analyzer.yaml";
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("label_order must list each of new, minor, moderate, severe exactly once")]
    InvalidLabelOrder,
    #[error("At least one model candidate must be configured")]
    NoCandidates,
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// One artifact the resolver may load, with the provenance reported for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCandidate {
    pub file: PathBuf,
    pub name: String,
    pub accuracy: String,
}

impl ModelCandidate {
    pub fn new(file: impl Into<PathBuf>, name: &str, accuracy: &str) -> Self {
        Self {
            file: file.into(),
            name: name.to_string(),
            accuracy: accuracy.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub port: u16,
    pub deployment: String,
    pub model_dir: PathBuf,
    pub candidates: Vec<ModelCandidate>,
    pub label_order: Vec<ClassLabel>,
    pub max_image_bytes: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            deployment: "actix-server".to_string(),
            model_dir: PathBuf::from("models"),
            candidates: default_candidates(),
            label_order: vec![
                ClassLabel::Minor,
                ClassLabel::Moderate,
                ClassLabel::New,
                ClassLabel::Severe,
            ],
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

fn default_candidates() -> Vec<ModelCandidate> {
    vec![
        ModelCandidate::new(
            "optimized_cookware_acc_0.2898.pt",
            "Optimized Cookware Classifier v2.0 (EfficientNetV2-B0)",
            "71.02%",
        ),
        ModelCandidate::new(
            "proven_cookware_classifier_acc_0.4034.pt",
            "Proven Cookware Classifier (EfficientNetV2-B0)",
            "40.34%",
        ),
        ModelCandidate::new(
            "original_cookware_classifier_acc_0.4489.pt",
            "Original Cookware Classifier (EfficientNetV2-B0)",
            "44.89%",
        ),
    ]
}

impl AnalyzerConfig {
    /// Loads the YAML file named by `ANALYZER_CONFIG` (or the default path when
    /// it exists), then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = env::var("ANALYZER_CONFIG").ok();
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                log::info!("No config file found, using built-in defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        let config = Self::from_yaml(&config_str)?;
        log::info!("Loaded analyzer config from {}", path);
        Ok(config)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: AnalyzerConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(port) = env::var("PORT") {
            self.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PORT",
                value: port.clone(),
            })?;
        }
        if let Ok(dir) = env::var("MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Ok(deployment) = env::var("DEPLOYMENT") {
            self.deployment = deployment;
        }
        if let Ok(model_path) = env::var("MODEL_PATH") {
            self.prepend_model_path(PathBuf::from(model_path));
        }
        Ok(())
    }

    /// Puts an explicit artifact path ahead of every configured candidate. It
    /// reports the primary candidate's provenance. Relative paths are taken
    /// from the working directory, not `model_dir`.
    pub fn prepend_model_path(&mut self, path: PathBuf) {
        let path = std::path::absolute(&path).unwrap_or(path);
        let (name, accuracy) = self
            .candidates
            .first()
            .map(|c| (c.name.clone(), c.accuracy.clone()))
            .unwrap_or_else(|| ("Custom Cookware Classifier".to_string(), "unknown".to_string()));
        self.candidates.insert(
            0,
            ModelCandidate {
                file: path,
                name,
                accuracy,
            },
        );
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        let distinct: HashSet<ClassLabel> = self.label_order.iter().copied().collect();
        if self.label_order.len() != ClassLabel::ALL.len() || distinct.len() != ClassLabel::ALL.len() {
            return Err(ConfigError::InvalidLabelOrder);
        }
        Ok(())
    }

    /// Candidate paths resolved against `model_dir`, in priority order.
    pub fn resolved_candidates(&self) -> Vec<ModelCandidate> {
        self.candidates
            .iter()
            .map(|c| ModelCandidate {
                file: if c.file.is_absolute() {
                    c.file.clone()
                } else {
                    self.model_dir.join(&c.file)
                },
                ..c.clone()
            })
            .collect()
    }

    pub fn label_order_array(&self) -> [ClassLabel; 4] {
        let mut order = ClassLabel::ALL;
        for (slot, label) in order.iter_mut().zip(&self.label_order) {
            *slot = *label;
        }
        order
    }
}

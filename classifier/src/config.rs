use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{ClassifierError, ClassifierResult};
use crate::labels::{ClassLabels, DEFAULT_LABELS};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
pub const DEFAULT_INPUT_SIZE: u32 = 128;

/// How raw scores are turned into probabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoftmaxMode {
    /// `exp(x) / sum(exp)`, as computed by the reference page.
    #[default]
    Naive,
    /// Subtracts the max score before exponentiating.
    Stable,
}

/// Classifier settings, usually read from a JSON file.
///
/// Every field has a default, so `{}` is a valid config describing the stock
/// vegetable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub labels: Vec<String>,
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub scale: f32,
    pub softmax: SoftmaxMode,
}

impl Default for ClassifierConfig {
    fn default() -> ClassifierConfig {
        ClassifierConfig {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
            input_size: DEFAULT_INPUT_SIZE,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
            scale: 255.0,
            softmax: SoftmaxMode::Naive,
        }
    }
}

impl ClassifierConfig {
    pub fn from_path(path: impl AsRef<Path>) -> ClassifierResult<ClassifierConfig> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: ClassifierConfig = serde_json::from_str(&content)
            .map_err(|e| ClassifierError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ClassifierResult<()> {
        self.class_labels()?;
        if self.input_size == 0 {
            return Err(ClassifierError::config("input_size must be greater than 0"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(ClassifierError::config(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        for (c, m) in self.mean.iter().enumerate() {
            if !m.is_finite() {
                return Err(ClassifierError::config(format!("mean[{c}] is not finite: {m}")));
            }
        }
        for (c, s) in self.std.iter().enumerate() {
            if !(s.is_finite() && *s > 0.0) {
                return Err(ClassifierError::config(format!(
                    "std[{c}] must be greater than 0, got {s}"
                )));
            }
        }
        Ok(())
    }

    pub fn class_labels(&self) -> ClassifierResult<ClassLabels> {
        ClassLabels::new(self.labels.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() -> ClassifierResult<()> {
        let config: ClassifierConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ClassifierConfig::default());
        config.validate()
    }

    #[test]
    fn partial_json_overrides() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{ "input_size": 224, "softmax": "stable" }"#).unwrap();
        assert_eq!(config.input_size, 224);
        assert_eq!(config.softmax, SoftmaxMode::Stable);
        assert_eq!(config.labels.len(), 7);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<ClassifierConfig>(r#"{ "size": 3 }"#).is_err());
    }

    #[test]
    fn validation() {
        let mut config = ClassifierConfig { input_size: 0, ..ClassifierConfig::default() };
        assert!(config.validate().is_err());
        config.input_size = 128;
        config.std[1] = 0.0;
        assert!(config.validate().is_err());
        config.std[1] = 0.224;
        config.mean[2] = f32::NAN;
        assert!(config.validate().is_err());
        config.mean[2] = 0.406;
        config.scale = -1.0;
        assert!(config.validate().is_err());
        config.scale = 255.0;
        config.labels = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file() -> ClassifierResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("veggie.json");
        std::fs::write(&path, r#"{ "labels": ["a", "b", "c"] }"#)?;
        let config = ClassifierConfig::from_path(&path)?;
        assert_eq!(config.class_labels()?.len(), 3);
        std::fs::write(&path, r#"{ "labels": ["a", "a"] }"#)?;
        assert!(ClassifierConfig::from_path(&path).is_err());
        Ok(())
    }
}

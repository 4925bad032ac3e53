//! Pipeline configuration and source trust policy.
//!
//! # Responsibility
//! - Map source URLs to trust scores by prefix.
//! - Load the pipeline configuration from a JSON file.
//!
//! # Invariants
//! - All configured trust scores lie within `[0, 1]`.
//! - The first matching prefix wins; unmatched sources get the default score.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Score used for sources that match no configured prefix.
pub const DEFAULT_TRUST_SCORE: f64 = 0.5;

/// Configuration loading/validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// One `prefix -> score` trust rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustRule {
    pub prefix: String,
    pub score: f64,
}

/// Ordered prefix rules assigning trust to sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrustPolicy {
    #[serde(default)]
    pub rules: Vec<TrustRule>,
    #[serde(default = "default_trust_score")]
    pub default_score: f64,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_score: DEFAULT_TRUST_SCORE,
        }
    }
}

impl TrustPolicy {
    pub fn new(rules: Vec<TrustRule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Returns the score of the first rule whose prefix starts `source_id`.
    pub fn trust_score(&self, source_id: &str) -> f64 {
        self.rules
            .iter()
            .find(|rule| source_id.starts_with(rule.prefix.as_str()))
            .map_or(self.default_score, |rule| rule.score)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_score("trust.default_score", self.default_score)?;
        for rule in &self.rules {
            if rule.prefix.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "trust rule prefix must not be empty".to_string(),
                ));
            }
            validate_score(&format!("trust rule `{}`", rule.prefix), rule.score)?;
        }
        Ok(())
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub trust: TrustPolicy,
    #[serde(default)]
    pub product_sources: Vec<String>,
    #[serde(default)]
    pub branch_sources: Vec<String>,
}

impl PipelineConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.trust.validate()?;
        Ok(config)
    }
}

fn default_trust_score() -> f64 {
    DEFAULT_TRUST_SCORE
}

fn validate_score(name: &str, score: f64) -> Result<(), ConfigError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} score {score} is outside [0, 1]"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PipelineConfig, TrustPolicy, TrustRule, DEFAULT_TRUST_SCORE};

    fn bank_policy() -> TrustPolicy {
        TrustPolicy::new(vec![
            TrustRule {
                prefix: "https://www.bank.example/".to_string(),
                score: 0.9,
            },
            TrustRule {
                prefix: "https://intern.bank.example/".to_string(),
                score: 0.95,
            },
        ])
    }

    #[test]
    fn first_matching_prefix_wins() {
        let policy = bank_policy();
        assert_eq!(policy.trust_score("https://www.bank.example/sparbrief"), 0.9);
        assert_eq!(policy.trust_score("https://intern.bank.example/x"), 0.95);
    }

    #[test]
    fn unmatched_source_gets_default() {
        assert_eq!(
            bank_policy().trust_score("https://elsewhere.example/"),
            DEFAULT_TRUST_SCORE
        );
    }

    #[test]
    fn config_applies_defaults_and_rejects_bad_scores() {
        let config = PipelineConfig::from_json(r#"{"database_path": "/tmp/facts.db"}"#).unwrap();
        assert!(config.product_sources.is_empty());
        assert_eq!(config.trust.default_score, DEFAULT_TRUST_SCORE);

        let err = PipelineConfig::from_json(
            r#"{"database_path": "/tmp/facts.db", "trust": {"rules": [{"prefix": "https://a/", "score": 1.2}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn config_rejects_unknown_fields() {
        let err = PipelineConfig::from_json(r#"{"database_path": "x", "neo4j_uri": "bolt://"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

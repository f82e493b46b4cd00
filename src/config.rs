//! Per-run pipeline configuration, read from TOML and overridden by command-line flags.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::isa::error::InstError;

pub const DEFAULT_WORD_WIDTHS: [u32; 4] = [8, 16, 32, 64];
const DEFAULT_SOURCE_DIR: &str = "./xml";
const DEFAULT_EXTENSION: &str = "xml";

/// What the driver does when one source file fails to parse or validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed file and return its error.
    #[default]
    Abort,
    /// Log the failure, leave the file out, and keep going.
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = InstError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(FailurePolicy::Abort),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(InstError::Config(format!(
                "unknown failure policy '{other}' (expected 'abort' or 'skip')"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Abort => f.write_str("abort"),
            FailurePolicy::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    /// File extension (without the dot) of source files; empty accepts every regular file.
    #[serde(default = "default_extension")]
    pub extension: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default = "default_word_widths")]
    pub word_widths: Vec<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            extension: default_extension(),
            failure_policy: FailurePolicy::default(),
            word_widths: default_word_widths(),
        }
    }
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>>(source_dir: P) -> Self {
        Self {
            source_dir: source_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn from_toml_str(text: &str) -> Result<Self, InstError> {
        let config: PipelineConfig =
            toml::from_str(text).map_err(|err| InstError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InstError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            InstError::Config(format!("cannot read '{}': {err}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), InstError> {
        if self.word_widths.is_empty() {
            return Err(InstError::Config("word_widths must not be empty".into()));
        }
        if let Some(width) = self.word_widths.iter().find(|w| !(1..=64).contains(*w)) {
            return Err(InstError::Config(format!(
                "word width {width} is outside 1..=64"
            )));
        }
        if self.extension.starts_with('.') {
            return Err(InstError::Config(format!(
                "extension '{}' must not start with a dot",
                self.extension
            )));
        }
        Ok(())
    }

    /// Whether `path` carries the configured extension (case-insensitive).
    pub fn accepts_extension(&self, path: &Path) -> bool {
        if self.extension.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_DIR)
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_word_widths() -> Vec<u32> {
    DEFAULT_WORD_WIDTHS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").expect("defaults");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.source_dir, PathBuf::from("./xml"));
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.word_widths, vec![8, 16, 32, 64]);
    }

    #[test]
    fn reads_every_key() {
        let config = PipelineConfig::from_toml_str(
            r#"
source_dir = "defs/dpu"
extension = "XML"
failure_policy = "skip"
word_widths = [16, 32]
"#,
        )
        .expect("config");
        assert_eq!(config.source_dir, PathBuf::from("defs/dpu"));
        assert_eq!(config.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.word_widths, vec![16, 32]);
        assert!(config.accepts_extension(Path::new("a.xml")));
        assert!(!config.accepts_extension(Path::new("a.txt")));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_widths() {
        assert!(matches!(
            PipelineConfig::from_toml_str("sourcedir = \"x\""),
            Err(InstError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("word_widths = []"),
            Err(InstError::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("word_widths = [32, 65]"),
            Err(InstError::Config(msg)) if msg.contains("65")
        ));
    }

    #[test]
    fn empty_extension_accepts_everything() {
        let mut config = PipelineConfig::new("x");
        config.extension.clear();
        assert!(config.accepts_extension(Path::new("README")));
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("Skip".parse::<FailurePolicy>().ok(), Some(FailurePolicy::Skip));
        assert!("retry".parse::<FailurePolicy>().is_err());
        assert_eq!(FailurePolicy::Abort.to_string(), "abort");
    }
}

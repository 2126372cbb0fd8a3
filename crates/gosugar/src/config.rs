//! Configuration for a gosugar project.
//!
//! Loaded from `.gosugar/config.toml` under the project root. Every section
//! is optional.
//!
//! ```toml
//! [case]
//! enabled = true
//! exceptions = ["legacy_name"]
//!
//! [runtime]
//! import = "example.com/mod/sugar"
//! alias = "sugar"
//!
//! [analyze]
//! disabled = ["unused_allocation"]
//! ```

use gosugar_syntax::case::{self, CaseConfig};
use gosugar_transform::{DEFAULT_RUNTIME_ALIAS, DEFAULT_RUNTIME_IMPORT, TransformConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where the lowered code imports the runtime package from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Import path of the runtime package.
    pub import: String,
    /// Package name used to qualify runtime calls.
    pub alias: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            import: DEFAULT_RUNTIME_IMPORT.to_string(),
            alias: DEFAULT_RUNTIME_ALIAS.to_string(),
        }
    }
}

/// Analyzer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct AnalyzeConfig {
    /// Check names whose findings are dropped (e.g. "unused_allocation").
    pub disabled: BTreeSet<String>,
}

impl AnalyzeConfig {
    pub fn allows(&self, check: &str) -> bool {
        !self.disabled.contains(check)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(default)]
pub struct Config {
    pub case: CaseConfig,
    pub runtime: RuntimeConfig,
    pub analyze: AnalyzeConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("runtime alias `{0}` is not a usable Go package name")]
    InvalidAlias(String),
    #[error("runtime import path `{0}` is not a valid Go import path")]
    InvalidImport(String),
}

impl Config {
    /// Location of the config file relative to a project root.
    pub const FILE: &'static str = ".gosugar/config.toml";

    /// Load the project config; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(Self::FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let alias = &self.runtime.alias;
        let mut chars = alias.chars();
        let identifier = chars
            .next()
            .is_some_and(|c| c == '_' || c.is_alphabetic())
            && chars.all(|c| c == '_' || c.is_alphanumeric());
        if !identifier || alias == "_" || case::is_reserved(alias) {
            return Err(ConfigError::InvalidAlias(alias.clone()));
        }

        let import = &self.runtime.import;
        if import.is_empty()
            || import
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '"' | '`' | '\\'))
        {
            return Err(ConfigError::InvalidImport(import.clone()));
        }
        Ok(())
    }

    /// Settings for one transform call.
    pub fn transform(&self) -> TransformConfig {
        TransformConfig {
            case: self.case.clone(),
            runtime_import: self.runtime.import.clone(),
            runtime_alias: self.runtime.alias.clone(),
        }
    }

    /// JSON schema of the config file.
    pub fn schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(Config)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.case.enabled);
        assert_eq!(config.runtime.import, "gosugar.dev/runtime/sugar");
        assert_eq!(config.runtime.alias, "sugar");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_load_project_config() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".gosugar")).unwrap();
        std::fs::write(
            dir.path().join(Config::FILE),
            r#"
[case]
enabled = true
exceptions = ["keep_me"]

[runtime]
import = "example.com/app/rt"
alias = "rt"

[analyze]
disabled = ["unused_allocation"]
"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert!(config.case.enabled);
        assert!(config.case.exceptions.contains("keep_me"));
        assert_eq!(config.runtime.alias, "rt");
        assert!(!config.analyze.allows("unused_allocation"));
        assert!(config.analyze.allows("double_free"));

        let transform = config.transform();
        assert_eq!(transform.runtime_import, "example.com/app/rt");
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str("[runtime]\nalias = \"rt\"\n").unwrap();
        assert_eq!(config.runtime.import, "gosugar.dev/runtime/sugar");
        assert_eq!(config.runtime.alias, "rt");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_toml_str("[runtime]\nalias = \"func\"\n"),
            Err(ConfigError::InvalidAlias(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[runtime]\nalias = \"9lives\"\n"),
            Err(ConfigError::InvalidAlias(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[runtime]\nimport = \"bad path\"\n"),
            Err(ConfigError::InvalidImport(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[case]\nenabled = \"yes\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_schema_names_sections() {
        let schema = Config::schema();
        let properties = &schema["properties"];
        assert!(properties.get("case").is_some());
        assert!(properties.get("runtime").is_some());
        assert!(properties.get("analyze").is_some());
    }
}

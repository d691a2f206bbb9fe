//! Build configuration.
//!
//! One immutable configuration value per build invocation: the targets to
//! produce, the project roots to process, and the small subset of host
//! compiler options the engine consults. Threaded explicitly through every
//! constructor; nothing reads ambient process state.

use crate::error::{Error, Result};
use crate::policy::ExtensionPolicy;
use crate::tree::CompilerRelease;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One output variant: which extensions its artifacts are renamed to.
///
/// An unset extension leaves that artifact kind untouched; script and
/// declaration outputs are configured independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaration_extname: Option<String>,
}

impl Target {
    /// Human-readable label for logs and summaries.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.extname.clone())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Validate and normalize this target into an extension policy.
    ///
    /// Extensions may be written with or without the leading dot; anything
    /// that is not a plain dotted suffix is a configuration error, surfaced
    /// before any build step runs.
    pub fn policy(&self) -> Result<ExtensionPolicy> {
        let extname = self
            .extname
            .as_deref()
            .map(|value| normalize_extname(&self.label(), value))
            .transpose()?;
        let declaration_extname = self
            .declaration_extname
            .as_deref()
            .map(|value| normalize_extname(&self.label(), value))
            .transpose()?;
        Ok(ExtensionPolicy::new(extname, declaration_extname))
    }
}

fn normalize_extname(target: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    let invalid = || Error::InvalidExtension {
        target: target.to_string(),
        value: value.to_string(),
    };
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '.') {
        return Err(invalid());
    }
    if trimmed
        .chars()
        .any(|c| c.is_whitespace() || c == '/' || c == '\\')
    {
        return Err(invalid());
    }
    if trimmed.starts_with('.') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!(".{trimmed}"))
    }
}

/// Subset of the host compiler's options the engine consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    /// Whether the host permits importing JSON modules directly; exempts
    /// `.json` specifiers from rewriting.
    pub resolve_json_module: bool,
    /// Whether incremental build metadata is kept between runs.
    pub incremental: bool,
    /// Host compiler release, selecting the node kind table.
    pub release: CompilerRelease,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            resolve_json_module: false,
            incremental: true,
            release: CompilerRelease::default(),
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub targets: Vec<Target>,
    #[serde(default = "default_projects")]
    pub projects: Vec<PathBuf>,
    #[serde(default)]
    pub compiler: CompilerOptions,
}

fn default_projects() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl ProjectConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            polyemit_util::fs::read_to_string_lossy(path).map_err(|source| Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Surface configuration errors before any build step runs.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(Error::NoTargets);
        }
        for target in &self.targets {
            target.policy()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_target_policy_normalizes_missing_dot() {
        let target = Target {
            name: None,
            extname: Some("mjs".into()),
            declaration_extname: Some("d.mts".into()),
        };
        let policy = target.policy().unwrap();
        assert_eq!(policy.script_extname(), Some(".mjs"));
        assert_eq!(policy.declaration_extname(), Some(".d.mts"));
    }

    #[test]
    fn test_target_policy_rejects_invalid_extensions() {
        for bad in ["", ".", "..", "a/b", "m js"] {
            let target = Target {
                name: Some("esm".into()),
                extname: Some(bad.into()),
                declaration_extname: None,
            };
            assert!(
                matches!(target.policy(), Err(Error::InvalidExtension { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_target_label_falls_back_to_extname() {
        let target = Target {
            name: None,
            extname: Some(".cjs".into()),
            declaration_extname: None,
        };
        assert_eq!(target.label(), ".cjs");
        assert_eq!(Target::default().label(), "default");
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("polyemit.json");
        fs::write(
            &path,
            r#"{
                "targets": [
                    { "name": "cjs", "extname": ".cjs" },
                    { "name": "esm", "extname": ".mjs", "declarationExtname": ".d.mts" }
                ],
                "projects": ["dist"],
                "compiler": { "resolveJsonModule": true, "release": "v5" }
            }"#,
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[1].declaration_extname.as_deref(), Some(".d.mts"));
        assert_eq!(config.projects, vec![PathBuf::from("dist")]);
        assert!(config.compiler.resolve_json_module);
        assert_eq!(config.compiler.release, CompilerRelease::V5);
    }

    #[test]
    fn test_load_missing_config_is_read_error() {
        let err = ProjectConfig::load(Path::new("/nonexistent/polyemit.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_malformed_config_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("polyemit.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ProjectConfig::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let config = ProjectConfig {
            targets: Vec::new(),
            projects: default_projects(),
            compiler: CompilerOptions::default(),
        };
        assert!(matches!(config.validate(), Err(Error::NoTargets)));
    }
}

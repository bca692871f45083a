//! Construction-time configuration for the permission service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::permission::PermissionMode;

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for this format.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration parsed but is not usable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Permission configuration file format.
///
/// ```json
/// {
///   "workingDir": "~/src/project",
///   "allowedTools": ["view", "bash:read"],
///   "mode": "regular"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionConfig {
    /// Directory used for empty and relative request paths.
    pub working_dir: Option<PathBuf>,
    /// `"tool"` or `"tool:action"` entries that never prompt.
    pub allowed_tools: Vec<String>,
    /// Initial permission mode.
    pub mode: PermissionMode,
    /// Legacy flag: start in Yolo mode regardless of `mode`.
    pub skip_requests: bool,
}

impl PermissionConfig {
    /// Mode the service starts in.
    pub fn initial_mode(&self) -> PermissionMode {
        if self.skip_requests {
            PermissionMode::Yolo
        } else {
            self.mode
        }
    }

    /// Reject allowlist entries that can never match.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for entry in &self.allowed_tools {
            let valid = match entry.split_once(':') {
                Some((tool, action)) => !tool.is_empty() && !action.is_empty(),
                None => !entry.is_empty(),
            };
            if !valid {
                return Err(ConfigError::Invalid(format!(
                    "allowed tool entry '{}' must be \"tool\" or \"tool:action\"",
                    entry
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate configuration from a JSON file.
///
/// `~` in the path and in `workingDir` is expanded to the home directory.
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<PermissionConfig, ConfigError> {
    let path_str = path.as_ref().to_string_lossy().to_string();
    let expanded_path = shellexpand::tilde(&path_str);

    let content = tokio::fs::read_to_string(Path::new(expanded_path.as_ref())).await?;
    let mut config: PermissionConfig = serde_json::from_str(&content)?;

    if let Some(dir) = &config.working_dir {
        let dir_str = dir.to_string_lossy().to_string();
        config.working_dir = Some(PathBuf::from(shellexpand::tilde(&dir_str).as_ref()));
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: PermissionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, PermissionConfig::default());
        assert_eq!(config.initial_mode(), PermissionMode::Regular);
    }

    #[test]
    fn test_skip_requests_forces_yolo() {
        let config = PermissionConfig {
            mode: PermissionMode::Plan,
            skip_requests: true,
            ..Default::default()
        };
        assert_eq!(config.initial_mode(), PermissionMode::Yolo);
    }

    #[test]
    fn test_validate_allowed_tools() {
        let cases = [
            (vec!["view"], true),
            (vec!["bash:read", "edit"], true),
            (vec![""], false),
            (vec![":read"], false),
            (vec!["bash:"], false),
        ];

        for (entries, ok) in cases {
            let config = PermissionConfig {
                allowed_tools: entries.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            };
            assert_eq!(config.validate().is_ok(), ok, "{:?}", entries);
        }
    }

    #[tokio::test]
    async fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("permissions.json");
        std::fs::write(
            &path,
            r#"{"workingDir": "/repo", "allowedTools": ["view"], "mode": "plan"}"#,
        )
        .unwrap();

        let config = load_config_file(&path).await.unwrap();
        assert_eq!(config.working_dir, Some(PathBuf::from("/repo")));
        assert_eq!(config.allowed_tools, vec!["view".to_string()]);
        assert_eq!(config.mode, PermissionMode::Plan);
    }

    #[tokio::test]
    async fn test_load_config_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_config_file(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let bad_json = dir.path().join("bad.json");
        std::fs::write(&bad_json, "{ not json").unwrap();
        assert!(matches!(
            load_config_file(&bad_json).await,
            Err(ConfigError::Json(_))
        ));

        let bad_mode = dir.path().join("mode.json");
        std::fs::write(&bad_mode, r#"{"mode": "careful"}"#).unwrap();
        assert!(matches!(
            load_config_file(&bad_mode).await,
            Err(ConfigError::Json(_))
        ));

        let bad_entry = dir.path().join("entry.json");
        std::fs::write(&bad_entry, r#"{"allowedTools": ["bash:"]}"#).unwrap();
        assert!(matches!(
            load_config_file(&bad_entry).await,
            Err(ConfigError::Invalid(_))
        ));
    }
}

use crate::config::substitute_env_vars;
use crate::utils::error::{AntaError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Commands collected by `exec snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotCommands {
    #[serde(default)]
    pub json_format: Vec<String>,
    #[serde(default)]
    pub text_format: Vec<String>,
}

impl SnapshotCommands {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;
        let commands: Self =
            toml::from_str(&processed_content).map_err(|e| AntaError::ConfigValidationError {
                field: "commands_list".to_string(),
                message: e.to_string(),
            })?;
        commands.validate()?;
        Ok(commands)
    }
}

impl Validate for SnapshotCommands {
    fn validate(&self) -> Result<()> {
        if self.json_format.is_empty() && self.text_format.is_empty() {
            return Err(AntaError::ConfigValidationError {
                field: "commands_list".to_string(),
                message: "at least one of json_format or text_format must list commands".to_string(),
            });
        }
        Ok(())
    }
}

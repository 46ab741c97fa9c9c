use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Build mode selected at synthesis time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(ConfigurationError::InvalidDefinition {
                field: "build mode",
                reason: format!("`{other}` is neither `development` nor `production`"),
            }),
        }
    }
}

/// Inputs a stack definition reads while building its graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    pub stack_name: String,
    pub build_mode: BuildMode,
    /// Directory holding compute unit sources; entry points are resolved against it.
    pub source_dir: PathBuf,
    /// Inject placeholder cloud credentials into unit environments.
    pub placeholder_credentials: bool,
}

impl StackConfig {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            ..Self::default()
        }
    }

    pub fn with_build_mode(mut self, mode: BuildMode) -> Self {
        self.build_mode = mode;
        self
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    pub fn with_placeholder_credentials(mut self, enabled: bool) -> Self {
        self.placeholder_credentials = enabled;
        self
    }

    /// Path of `file` under the source directory, `/`-separated.
    pub fn source_path(&self, file: &str) -> String {
        let dir = self.source_dir.to_string_lossy();
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() {
            file.to_string()
        } else {
            format!("{dir}/{file}")
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            stack_name: "stack".to_string(),
            build_mode: BuildMode::default(),
            source_dir: PathBuf::from("lambdas"),
            placeholder_credentials: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_parses_common_spellings() {
        assert_eq!("production".parse(), Ok(BuildMode::Production));
        assert_eq!(" Prod ".parse(), Ok(BuildMode::Production));
        assert_eq!("dev".parse(), Ok(BuildMode::Development));
        assert!("staging".parse::<BuildMode>().is_err());
    }

    #[test]
    fn source_path_joins_with_forward_slash() {
        let config = StackConfig::new("demo").with_source_dir("lambdas/");
        assert_eq!(config.source_path("get-all.ts"), "lambdas/get-all.ts");
        let flat = StackConfig::new("demo").with_source_dir("");
        assert_eq!(flat.source_path("get-all.ts"), "get-all.ts");
    }
}

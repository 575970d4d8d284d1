//! Configuration file loader for pages-publisher
//!
//! This module provides configuration loading, overriding and validation.

use super::config::*;
use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".pages-publisher.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
}

/// Values given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub commit_message: Option<String>,
    pub environment_policy: Option<EnvironmentPolicy>,
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Explicit config file, replacing `<project>/.pages-publisher.yaml`
    pub config_path: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub overrides: ConfigOverrides,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options for a project, reading the process environment
    pub fn for_project<P: Into<PathBuf>>(project_path: P) -> Self {
        Self {
            project_path: project_path.into(),
            config_path: None,
            overrides: ConfigOverrides::default(),
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "publish.branch")
    pub field: String,

    /// Error message
    pub message: String,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Config file (`--config` or `./.pages-publisher.yaml`)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let config_path = options
            .config_path
            .clone()
            .unwrap_or_else(|| options.project_path.join(CONFIG_FILENAME));

        let mut config = match Self::load_config_file(&config_path).await? {
            Some(config) => {
                tracing::debug!(path = %config_path.display(), "Loaded config file");
                config
            }
            None if options.config_path.is_some() => {
                return Err(PublishError::ConfigError(format!(
                    "config file not found: {}",
                    config_path.display()
                )));
            }
            None => PublishConfig::default(),
        };

        Self::apply_env_overrides(&mut config, &options.env)?;
        Self::apply_cli_overrides(&mut config, &options.overrides);

        if config.security.env_var_expansion {
            Self::expand_env_vars(&mut config, &options.env);
        }

        Ok(config)
    }

    /// Load configuration from a YAML file, `None` if it does not exist
    pub async fn load_config_file(file_path: &Path) -> Result<Option<PublishConfig>, PublishError> {
        if !file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        // An empty file parses as YAML null
        if content.trim().is_empty() {
            return Ok(Some(PublishConfig::default()));
        }

        let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::ConfigError(format!("Failed to parse YAML config: {}", e))
        })?;

        Ok(Some(config))
    }

    /// Apply `PAGES_PUBLISHER_*` environment variables
    fn apply_env_overrides(
        config: &mut PublishConfig,
        env: &HashMap<String, String>,
    ) -> Result<(), PublishError> {
        if let Some(message) = env.get("PAGES_PUBLISHER_COMMIT_MESSAGE") {
            config.publish.commit_message = message.clone();
        }

        if let Some(policy) = env.get("PAGES_PUBLISHER_ENV_POLICY") {
            config.environment.policy = policy.parse().map_err(PublishError::ConfigError)?;
        }

        if let Some(output_dir) = env.get("PAGES_PUBLISHER_OUTPUT_DIR") {
            config.publish.output_dir = output_dir.clone();
        }

        if let Some(remote) = env.get("PAGES_PUBLISHER_REMOTE") {
            config.publish.remote = remote.clone();
        }

        if let Some(branch) = env.get("PAGES_PUBLISHER_BRANCH") {
            config.publish.branch = branch.clone();
        }

        Ok(())
    }

    fn apply_cli_overrides(config: &mut PublishConfig, overrides: &ConfigOverrides) {
        if let Some(ref message) = overrides.commit_message {
            config.publish.commit_message = message.clone();
        }
        if let Some(policy) = overrides.environment_policy {
            config.environment.policy = policy;
        }
    }

    /// Expand `${VAR}` references in the fields that commonly carry them
    fn expand_env_vars(config: &mut PublishConfig, env: &HashMap<String, String>) {
        for package in config.dependencies.packages.iter_mut() {
            *package = Self::expand_string(package, env);
        }
        config.publish.remote = Self::expand_string(&config.publish.remote, env);
        config.publish.commit_message = Self::expand_string(&config.publish.commit_message, env);
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left untouched.
    pub fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                match env.get(var_name) {
                    Some(value) => value.clone(),
                    None => {
                        tracing::warn!("Environment variable {} not found", var_name);
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
            });
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some("Currently supported version is \"1.0\" only".to_string()),
            });
        }

        // 2. Relative paths
        Self::validate_relative_path("environment.path", &config.environment.path, &mut errors);
        Self::validate_relative_path("publish.outputDir", &config.publish.output_dir, &mut errors);
        Self::validate_relative_path("generation.script", &config.generation.script, &mut errors);

        // 3. Required values
        let required = [
            ("environment.python", &config.environment.python),
            ("dependencies.installer", &config.dependencies.installer),
            ("publish.remote", &config.publish.remote),
            ("publish.branch", &config.publish.branch),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: format!("{} must not be empty", field),
                });
            }
        }

        if config.publish.commit_message.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "publish.commitMessage".to_string(),
                message: "Commit message must not be empty".to_string(),
            });
        }

        // 4. Soft checks
        if config.dependencies.packages.is_empty() {
            warnings.push(ConfigValidationWarning {
                field: "dependencies.packages".to_string(),
                message: "No packages configured, the install step will be skipped".to_string(),
                suggestion: None,
            });
        }

        if config.environment.policy == EnvironmentPolicy::Recreate
            && config.dependencies.policy == crate::core::step::StepPolicy::ContinueOnError
        {
            warnings.push(ConfigValidationWarning {
                field: "dependencies.policy".to_string(),
                message: "Install failures are tolerated but the environment is recreated every run"
                    .to_string(),
                suggestion: Some(
                    "Use dependencies.policy: failFast or environment.policy: persist".to_string(),
                ),
            });
        }

        if !config.security.secrets_scanning.enabled {
            warnings.push(ConfigValidationWarning {
                field: "security.secretsScanning.enabled".to_string(),
                message: "Secrets scanning of the output directory is disabled".to_string(),
                suggestion: None,
            });
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_relative_path(field: &str, value: &str, errors: &mut Vec<ConfigValidationError>) {
        if value.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("{} must not be empty", field),
            });
            return;
        }

        let path = Path::new(value);
        if path.is_absolute() {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("{} must be relative to the project directory", field),
            });
        } else if path.components().any(|c| matches!(c, Component::ParentDir)) {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("{} must not leave the project directory", field),
            });
        }
    }

    /// Default configuration as documented YAML, written by `init`
    pub fn default_config_yaml() -> Result<String, PublishError> {
        let body = serde_yaml::to_string(&PublishConfig::default())
            .map_err(|e| PublishError::ConfigError(e.to_string()))?;

        Ok(format!(
            "# pages-publisher configuration\n\
             # environment.policy: persist keeps the environment between runs, recreate wipes it\n\
             # dependencies.policy: continueOnError tolerates install failures, failFast aborts\n\
             {}",
            body
        ))
    }
}

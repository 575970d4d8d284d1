//! Configuration structures and types for pages-publisher
//!
//! This module provides type-safe configuration management with serde support.
//! Every field has a default, so a missing or partial config file yields the
//! behaviour of a plain zero-argument run.

use crate::core::step::StepPolicy;
use serde::{Deserialize, Serialize};

/// Commit message used when none is configured ("data update")
pub const DEFAULT_COMMIT_MESSAGE: &str = "Обновление данных";

/// Timetable package, installed straight from its source repository
pub const DEFAULT_TIMETABLE_PACKAGE: &str = "git+https://github.com/egov66/egov66-timetable";

/// Messaging client with its optional crypto extra
pub const DEFAULT_MESSAGING_PACKAGE: &str = "telethon[cryptg]";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishConfig {
    /// Schema version
    pub version: String,

    /// Execution environment settings
    pub environment: EnvironmentConfig,

    /// Dependency installation settings
    pub dependencies: DependenciesConfig,

    /// Generation step settings
    pub generation: GenerationConfig,

    /// Where and how the output is committed and pushed
    pub publish: PublishTargetConfig,

    /// Security settings
    pub security: SecurityConfig,
}

/// What happens to an existing environment directory at the start of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPolicy {
    /// Keep the directory; packages from earlier runs stay available
    #[default]
    Persist,
    /// Delete the directory before creating the environment
    Recreate,
}

impl std::str::FromStr for EnvironmentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "persist" => Ok(Self::Persist),
            "recreate" => Ok(Self::Recreate),
            other => Err(format!(
                "unknown environment policy '{}' (expected persist or recreate)",
                other
            )),
        }
    }
}

/// Execution environment configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EnvironmentConfig {
    /// Environment directory, relative to the project directory
    pub path: String,

    /// Interpreter used to create the environment
    pub python: String,

    /// Skip bootstrapping the package installer into the environment
    pub without_pip: bool,

    /// Persistence of the environment across runs
    pub policy: EnvironmentPolicy,
}

/// Dependency installation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DependenciesConfig {
    /// Installer program, resolved through the activated `PATH`
    pub installer: String,

    /// Package references handed to `<installer> install`
    pub packages: Vec<String>,

    /// Failure policy of the install step
    pub policy: StepPolicy,
}

/// Generation step configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Script run by the environment's interpreter
    pub script: String,

    /// Run the interpreter with `-O`
    pub optimize: bool,

    /// Extra arguments after the script
    pub args: Vec<String>,
}

/// Publish target configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PublishTargetConfig {
    /// Output directory, relative to the project directory
    pub output_dir: String,

    /// Remote to push to
    pub remote: String,

    /// Branch pushed and tracked on the remote
    pub branch: String,

    /// Commit message
    pub commit_message: String,

    /// Create a commit even when nothing changed
    pub allow_empty_commit: bool,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Program names allowed in addition to the built-in list
    pub allowed_commands: Vec<String>,

    /// Expand `${VAR}` references in package refs, remote and commit message
    pub env_var_expansion: bool,

    /// Secrets scanning of the output directory
    pub secrets_scanning: SecretsScanningConfig,
}

/// Secrets scanning configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SecretsScanningConfig {
    /// Enable secrets scanning (default: true)
    pub enabled: bool,

    /// Glob-style patterns of output paths to skip
    pub ignore_patterns: Vec<String>,
}

/// Default configuration values
impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            environment: EnvironmentConfig::default(),
            dependencies: DependenciesConfig::default(),
            generation: GenerationConfig::default(),
            publish: PublishTargetConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            path: "venv".to_string(),
            python: "python3".to_string(),
            without_pip: true,
            policy: EnvironmentPolicy::Persist,
        }
    }
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            installer: "pip".to_string(),
            packages: vec![
                DEFAULT_TIMETABLE_PACKAGE.to_string(),
                DEFAULT_MESSAGING_PACKAGE.to_string(),
            ],
            policy: StepPolicy::ContinueOnError,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            script: "compose.py".to_string(),
            optimize: true,
            args: Vec::new(),
        }
    }
}

impl Default for PublishTargetConfig {
    fn default() -> Self {
        Self {
            output_dir: "pages".to_string(),
            remote: "origin".to_string(),
            branch: "pages".to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            allow_empty_commit: false,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_commands: Vec::new(),
            env_var_expansion: true,
            secrets_scanning: SecretsScanningConfig::default(),
        }
    }
}

impl Default for SecretsScanningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_patterns: Vec::new(),
        }
    }
}

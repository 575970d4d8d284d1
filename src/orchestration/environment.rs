//! Execution environment - provisioning and activation
//!
//! Activation is not a process of its own: instead of sourcing an activate
//! script, the variables it would set are attached to every command spawned
//! after provisioning.

use crate::core::config::{EnvironmentConfig, EnvironmentPolicy};
use crate::core::error::PublishError;
use crate::core::step::{Step, StepPolicy, run_step};
use crate::core::traits::{CommandRunner, CommandSpec};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

/// Resolve a project path against the current directory
///
/// Commands run with the project directory as their working directory, so
/// paths derived from a relative project path would resolve twice.
pub fn absolute_project_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// An isolated interpreter environment rooted inside the project directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    root: PathBuf,
}

impl ExecutionEnvironment {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Environment for `config.path` resolved against the project directory
    pub fn for_project(project_path: &Path, config: &EnvironmentConfig) -> Self {
        Self::new(project_path.join(&config.path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    /// The environment's own interpreter
    pub fn python(&self) -> PathBuf {
        self.bin_dir().join(if cfg!(windows) { "python.exe" } else { "python" })
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Command that creates the environment
    pub fn creation_command(
        &self,
        project_path: &Path,
        config: &EnvironmentConfig,
    ) -> CommandSpec {
        let mut command = CommandSpec::new(&config.python, project_path).args(["-m", "venv"]);
        if config.without_pip {
            command = command.arg("--without-pip");
        }
        command.arg(self.root.to_string_lossy())
    }

    /// Variables an activated shell would carry, with `base_path` as the
    /// inherited `PATH`
    pub fn activation(&self, base_path: Option<OsString>) -> ActivatedEnvironment {
        let mut paths = vec![self.bin_dir()];
        if let Some(base) = base_path {
            paths.extend(std::env::split_paths(&base));
        }
        let path = std::env::join_paths(paths)
            .map(|joined| joined.to_string_lossy().into_owned())
            .unwrap_or_else(|_| self.bin_dir().to_string_lossy().into_owned());

        ActivatedEnvironment {
            environment: self.clone(),
            path,
        }
    }
}

/// An environment whose variables are applied to later commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedEnvironment {
    environment: ExecutionEnvironment,
    path: String,
}

impl ActivatedEnvironment {
    pub fn environment(&self) -> &ExecutionEnvironment {
        &self.environment
    }

    /// `PATH` value with the environment's bin directory first
    pub fn path_var(&self) -> &str {
        &self.path
    }

    /// Attach the activation variables to a command
    pub fn apply(&self, command: CommandSpec) -> CommandSpec {
        command
            .env("VIRTUAL_ENV", self.environment.root.to_string_lossy())
            .env("PATH", self.path.clone())
            .env_remove("PYTHONHOME")
    }
}

/// Create the environment according to its policy and activate it
///
/// Creation failures are always fatal.
pub async fn provision(
    runner: &dyn CommandRunner,
    project_path: &Path,
    config: &EnvironmentConfig,
) -> Result<ActivatedEnvironment, PublishError> {
    let project_path = absolute_project_path(project_path);
    let environment = ExecutionEnvironment::for_project(&project_path, config);

    if config.policy == EnvironmentPolicy::Recreate && environment.exists() {
        tracing::info!(path = %environment.root().display(), "Removing previous environment");
        tokio::fs::remove_dir_all(environment.root())
            .await
            .map_err(|e| PublishError::EnvironmentCleanup {
                path: environment.root().to_path_buf(),
                message: e.to_string(),
            })?;
    } else if environment.exists() {
        tracing::debug!(path = %environment.root().display(), "Reusing existing environment");
    }

    let command = environment.creation_command(&project_path, config);
    run_step(runner, Step::CreateEnvironment, &command, StepPolicy::FailFast).await?;

    Ok(environment.activation(std::env::var_os("PATH")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::CommandStatus;
    use crate::security::command_executor::CommandError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Recorder {
        code: i32,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl Recorder {
        fn new(code: i32) -> Self {
            Self {
                code,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, command: &CommandSpec) -> Result<CommandStatus, CommandError> {
            self.calls.lock().unwrap().push(command.clone());
            Ok(CommandStatus::from_code(self.code))
        }
    }

    #[test]
    fn test_creation_command_skips_pip() {
        let config = EnvironmentConfig::default();
        let environment = ExecutionEnvironment::for_project(Path::new("/srv/site"), &config);
        let command = environment.creation_command(Path::new("/srv/site"), &config);

        assert_eq!(command.program, "python3");
        assert_eq!(command.args[..3], ["-m", "venv", "--without-pip"]);
        assert_eq!(command.args[3], Path::new("/srv/site").join("venv").to_string_lossy());
        assert_eq!(command.working_dir, PathBuf::from("/srv/site"));
    }

    #[test]
    fn test_creation_command_with_pip() {
        let config = EnvironmentConfig {
            without_pip: false,
            ..Default::default()
        };
        let environment = ExecutionEnvironment::for_project(Path::new("."), &config);
        let command = environment.creation_command(Path::new("."), &config);
        assert!(!command.args.iter().any(|a| a == "--without-pip"));
    }

    #[test]
    fn test_activation_prepends_bin_dir() {
        let environment = ExecutionEnvironment::new("/srv/site/venv");
        let base = std::env::join_paths(["/usr/local/bin", "/usr/bin"]).unwrap();
        let activated = environment.activation(Some(base));

        let entries: Vec<PathBuf> = std::env::split_paths(activated.path_var()).collect();
        assert_eq!(entries[0], environment.bin_dir());
        assert_eq!(entries[1], PathBuf::from("/usr/local/bin"));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_apply_sets_virtual_env() {
        let environment = ExecutionEnvironment::new("/srv/site/venv");
        let activated = environment.activation(None);
        let command = activated.apply(CommandSpec::new("pip", "/srv/site"));

        assert!(command
            .envs
            .iter()
            .any(|(k, v)| k == "VIRTUAL_ENV" && v == "/srv/site/venv"));
        assert!(command.envs.iter().any(|(k, _)| k == "PATH"));
        assert_eq!(command.env_remove, vec!["PYTHONHOME".to_string()]);
    }

    #[tokio::test]
    async fn test_provision_persist_keeps_directory() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("venv/lib/marker");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "installed").unwrap();

        let runner = Recorder::new(0);
        let activated = provision(&runner, temp_dir.path(), &EnvironmentConfig::default())
            .await
            .unwrap();

        assert!(marker.exists());
        assert_eq!(activated.environment().root(), temp_dir.path().join("venv"));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provision_recreate_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let marker = temp_dir.path().join("venv/lib/marker");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "installed").unwrap();

        let config = EnvironmentConfig {
            policy: EnvironmentPolicy::Recreate,
            ..Default::default()
        };
        let runner = Recorder::new(0);
        provision(&runner, temp_dir.path(), &config).await.unwrap();

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_provision_resolves_relative_project_path() {
        let temp_dir = TempDir::new_in(".").unwrap();
        let relative = temp_dir
            .path()
            .strip_prefix(std::env::current_dir().unwrap())
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| temp_dir.path().to_path_buf());
        assert!(relative.is_relative());
        let marker = temp_dir.path().join("venv/lib/marker");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, "installed").unwrap();

        let config = EnvironmentConfig {
            policy: EnvironmentPolicy::Recreate,
            ..Default::default()
        };
        let runner = Recorder::new(0);
        let activated = provision(&runner, &relative, &config).await.unwrap();

        assert!(!marker.exists());

        let calls = runner.calls.lock().unwrap();
        let root = Path::new(calls[0].args.last().unwrap());
        assert!(root.is_absolute());
        assert!(calls[0].working_dir.is_absolute());
        assert_eq!(
            root.parent().unwrap().canonicalize().unwrap(),
            temp_dir.path().canonicalize().unwrap()
        );
        assert!(activated.environment().root().is_absolute());
    }

    #[test]
    fn test_absolute_project_path() {
        let resolved = absolute_project_path(Path::new("site"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("site"));
        assert_eq!(
            absolute_project_path(Path::new("/srv/site")),
            PathBuf::from("/srv/site")
        );
    }

    #[tokio::test]
    async fn test_provision_failure_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let runner = Recorder::new(1);

        let error = provision(&runner, temp_dir.path(), &EnvironmentConfig::default())
            .await
            .unwrap_err();

        assert_eq!(error.failed_step(), Some(Step::CreateEnvironment));
        assert_eq!(error.exit_code(), 1);
    }
}

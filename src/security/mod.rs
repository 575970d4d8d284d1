pub mod command_executor;
pub mod secrets_scanner;

pub use command_executor::{ALLOWED_COMMANDS, CommandError, SafeCommandExecutor};
pub use secrets_scanner::{ScanReport, SecretFinding, SecretsScanner, Severity};

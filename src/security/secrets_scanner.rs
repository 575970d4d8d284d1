//! Secrets scanner for generated output
//!
//! Everything under the output directory ends up on a public hosting branch,
//! so the generated files are scanned for credentials before they are staged.
//! The generator talks to a messaging API with a bot token, which makes a
//! leaked token in a rendered page the main thing to catch.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Severity level for detected secrets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
        }
    }
}

/// Pattern for detecting a specific type of secret
#[derive(Clone)]
pub struct SecretPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub severity: Severity,
}

/// A single finding from the secrets scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretFinding {
    /// Path relative to the scanned directory
    pub file: PathBuf,
    pub line: usize,
    pub secret_type: String,
    pub severity: Severity,
    /// Masked version of the match
    pub matched: String,
}

/// Report from scanning a directory for secrets
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub has_secrets: bool,
    pub findings: Vec<SecretFinding>,
    pub scanned_files: usize,
    pub skipped_files: Vec<PathBuf>,
}

lazy_static! {
    static ref DEFAULT_PATTERNS: Vec<SecretPattern> = vec![
        SecretPattern {
            name: "Telegram Bot Token",
            regex: Regex::new(r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b").unwrap(),
            severity: Severity::Critical,
        },
        SecretPattern {
            name: "Telegram API Hash",
            regex: Regex::new(r#"(?i)api[_-]?hash\s*[:=]\s*['"]?[0-9a-f]{32}['"]?"#).unwrap(),
            severity: Severity::Critical,
        },
        SecretPattern {
            name: "GitHub Token",
            regex: Regex::new(r"gh[pousr]_[a-zA-Z0-9]{36,}").unwrap(),
            severity: Severity::Critical,
        },
        SecretPattern {
            name: "Private Key",
            regex: Regex::new(r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----").unwrap(),
            severity: Severity::Critical,
        },
        SecretPattern {
            name: "AWS Access Key",
            regex: Regex::new(r"AKIA[0-9A-Z]{16}").unwrap(),
            severity: Severity::Critical,
        },
        SecretPattern {
            name: "Generic API Key",
            regex: Regex::new(r#"(?i)(?:api[_-]?key|apikey|api[_-]?secret)\s*[:=]\s*['"]([a-zA-Z0-9_\-]{20,})['"]"#).unwrap(),
            severity: Severity::High,
        },
        SecretPattern {
            name: "Generic Secret",
            regex: Regex::new(r#"(?i)(?:secret|password|passwd)\s*[:=]\s*['"]([^'"\s]{8,})['"]"#).unwrap(),
            severity: Severity::Medium,
        },
    ];

    static ref DEFAULT_IGNORE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(^|/)\.git(/|$)").unwrap(),
        Regex::new(r"\.(?:png|jpe?g|gif|ico|webp|woff2?|ttf|pdf)$").unwrap(),
    ];
}

/// Scanner for detecting credentials in generated files
///
/// # Examples
///
/// ```no_run
/// use pages_publisher::security::SecretsScanner;
/// use std::path::Path;
///
/// let scanner = SecretsScanner::new();
/// let report = scanner.scan_directory(Path::new("pages")).unwrap();
///
/// if report.has_secrets {
///     println!("Found {} secrets!", report.findings.len());
/// }
/// ```
pub struct SecretsScanner {
    patterns: Vec<SecretPattern>,
    custom_ignore_patterns: Vec<Regex>,
}

impl Default for SecretsScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretsScanner {
    /// Creates a new SecretsScanner with default patterns
    pub fn new() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.clone(),
            custom_ignore_patterns: Vec::new(),
        }
    }

    /// Configures custom ignore patterns
    ///
    /// # Examples
    ///
    /// ```
    /// use pages_publisher::security::SecretsScanner;
    /// use std::path::Path;
    ///
    /// let mut scanner = SecretsScanner::new();
    /// scanner.configure(&["*.bak", "drafts/*"]);
    /// assert!(scanner.should_ignore(Path::new("drafts/index.html")));
    /// ```
    pub fn configure<S: AsRef<str>>(&mut self, patterns: &[S]) {
        self.custom_ignore_patterns = patterns
            .iter()
            .filter_map(|p| Self::glob_to_regex(p.as_ref()))
            .collect();
    }

    /// Scans a directory tree for secrets
    ///
    /// Paths in the report and ignore matching are relative to `root`.
    pub fn scan_directory(&self, root: &Path) -> anyhow::Result<ScanReport> {
        let mut report = ScanReport::default();

        for entry in WalkDir::new(root).into_iter().filter_entry(|e| {
            // Prune .git without descending into it
            e.depth() == 0 || e.file_name() != ".git"
        }) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if self.should_ignore(&relative) {
                report.skipped_files.push(relative);
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(content) => {
                    report.findings.extend(self.scan_content(&content, &relative));
                    report.scanned_files += 1;
                }
                // Binary or unreadable
                Err(_) => report.skipped_files.push(relative),
            }
        }

        report.has_secrets = !report.findings.is_empty();
        Ok(report)
    }

    /// Scans file content for secrets
    pub fn scan_content(&self, content: &str, file_path: &Path) -> Vec<SecretFinding> {
        let mut findings = Vec::new();

        for (line_idx, line) in content.lines().enumerate() {
            for pattern in &self.patterns {
                for capture in pattern.regex.find_iter(line) {
                    findings.push(SecretFinding {
                        file: file_path.to_path_buf(),
                        line: line_idx + 1,
                        secret_type: pattern.name.to_string(),
                        severity: pattern.severity,
                        matched: Self::mask_match(capture.as_str()),
                    });
                }
            }
        }

        findings
    }

    /// Masks a matched secret for safe display
    ///
    /// Shows first 5 and last 5 characters for identification.
    ///
    /// # Examples
    ///
    /// ```
    /// use pages_publisher::security::SecretsScanner;
    ///
    /// assert_eq!(SecretsScanner::mask_match("short"), "****");
    /// assert_eq!(SecretsScanner::mask_match("very-long-secret-key-12345"), "very-...12345");
    /// ```
    pub fn mask_match(matched: &str) -> String {
        let chars: Vec<char> = matched.chars().collect();
        if chars.len() <= 10 {
            return "****".to_string();
        }

        let prefix: String = chars[..5].iter().collect();
        let suffix: String = chars[chars.len() - 5..].iter().collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Checks if a (relative) file path should be ignored
    pub fn should_ignore(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");

        DEFAULT_IGNORE_PATTERNS
            .iter()
            .chain(self.custom_ignore_patterns.iter())
            .any(|pattern| pattern.is_match(&path_str))
    }

    /// Converts glob pattern to an anchored regex
    fn glob_to_regex(glob: &str) -> Option<Regex> {
        let pattern = regex::escape(glob)
            .replace(r"\*", ".*")
            .replace(r"\?", ".");

        Regex::new(&format!("^{}$", pattern)).ok()
    }
}

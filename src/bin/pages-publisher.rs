//! pages-publisher CLI
//!
//! Regenerates the site pages and publishes them to their git branch

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pages_publisher::core::logging;
use pages_publisher::{
    CONFIG_FILENAME, ConfigLoadOptions, ConfigLoader, ConfigOverrides, EnvironmentPolicy,
    FailedRun, HistoryOptions, PreflightChecker, PublishConfig, PublishOrchestrator, RunHistory,
    RunStateMachine, SafeCommandExecutor,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Instant;

/// Regenerate the site pages and publish them to git
#[derive(Parser)]
#[command(name = "pages-publisher")]
#[command(version)]
#[command(about = "Regenerate the site pages and publish them to git", long_about = None)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(long, global = true, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Config file (defaults to <project>/.pages-publisher.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log format (text, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the publishing workflow (default)
    Run(RunArgs),

    /// Check that the project is ready to publish
    Check,

    /// Display run history
    Stats {
        /// Show runs from the last N days
        #[arg(long, default_value = "30")]
        days: i64,

        /// Show only failed runs
        #[arg(long)]
        failures_only: bool,

        /// Maximum number of recent runs listed
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Stop before staging, committing and pushing
    #[arg(long)]
    dry_run: bool,

    /// Commit message (overrides config and environment)
    #[arg(long, value_name = "MSG")]
    commit_message: Option<String>,

    /// Remove the environment directory before creating it
    #[arg(long)]
    recreate_env: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format.as_deref(), cli.verbose);

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("\n❌ Error");
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let project_path = cli.project_dir.unwrap_or_else(|| PathBuf::from("."));

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_command(project_path, cli.config, args).await,
        Commands::Check => check_command(project_path, cli.config).await,
        Commands::Stats {
            days,
            failures_only,
            limit,
        } => stats_command(project_path, days, failures_only, limit).await,
        Commands::Init { force } => init_command(project_path, cli.config, force).await,
    }
}

async fn load_config(
    project_path: &Path,
    config_path: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<PublishConfig> {
    let mut options = ConfigLoadOptions::for_project(project_path);
    options.config_path = config_path;
    options.overrides = overrides;

    Ok(ConfigLoader::load(options).await?)
}

async fn run_command(
    project_path: PathBuf,
    config_path: Option<PathBuf>,
    args: RunArgs,
) -> Result<i32> {
    println!("\n📄 pages-publisher\n");

    let overrides = ConfigOverrides {
        commit_message: args.commit_message,
        environment_policy: args.recreate_env.then_some(EnvironmentPolicy::Recreate),
    };
    let config = load_config(&project_path, config_path, overrides).await?;
    let target = config.publish.clone();

    let runner = Arc::new(SafeCommandExecutor::with_allowed(
        config.security.allowed_commands.clone(),
    ));
    let mut orchestrator =
        PublishOrchestrator::new(&project_path, config, runner).with_dry_run(args.dry_run);

    let start_time = Instant::now();
    let result = orchestrator.run().await;

    let mut history = RunHistory::new(&project_path);
    if let Err(e) = history.initialize().await {
        eprintln!("⚠️  Failed to load run history: {}", e);
    }

    match result {
        Ok(report) => {
            if let Err(e) = history.record_run(&report).await {
                eprintln!("⚠️  Failed to record run history: {}", e);
            }

            if report.dry_run {
                println!("\n✅ Dry run completed, nothing was published");
            } else {
                println!("\n✅ Publishing completed successfully!");
            }
            if report.install.is_tolerated_failure() {
                println!("  ⚠️  Dependency installation failed (tolerated)");
            }
            match report.publish {
                Some(outcome) if outcome.committed => {
                    println!("  📝 New commit pushed to {}/{}", target.remote, target.branch)
                }
                Some(_) => println!(
                    "  ℹ️  No changes to commit, {}/{} is up to date",
                    target.remote, target.branch
                ),
                None => {}
            }
            println!("  ⏱️  {:.2}s", report.duration_ms as f64 / 1000.0);
            Ok(0)
        }
        Err(error) => {
            let failed = FailedRun {
                run_id: orchestrator.run_id(),
                started_at: orchestrator.started_at(),
                dry_run: orchestrator.is_dry_run(),
                install: orchestrator.install_outcome().cloned(),
                duration: start_time.elapsed().as_millis() as u64,
            };
            if let Err(e) = history.record_failure(failed, &error).await {
                eprintln!("⚠️  Failed to record run history: {}", e);
            }

            eprintln!("\n❌ Publishing failed [{}]", error.code());
            eprintln!("{}", error);
            let actions = error.suggested_actions();
            if !actions.is_empty() {
                eprintln!("\nSuggested actions:");
                for action in actions {
                    eprintln!("  - {}", action);
                }
            }
            Ok(error.exit_code())
        }
    }
}

async fn check_command(project_path: PathBuf, config_path: Option<PathBuf>) -> Result<i32> {
    println!("\n🔍 Preflight Check\n");

    let config = load_config(&project_path, config_path, ConfigOverrides::default()).await?;

    let validation = ConfigLoader::validate(&config);
    if validation.valid {
        println!("  ✅ config: valid");
    } else {
        println!("  ❌ config: invalid");
        for error in &validation.errors {
            println!("    - [{}] {}", error.field, error.message);
        }
    }
    for warning in &validation.warnings {
        println!("  ⚠️  [{}] {}", warning.field, warning.message);
        if let Some(ref suggestion) = warning.suggestion {
            println!("      {}", suggestion);
        }
    }

    let runner = SafeCommandExecutor::with_allowed(config.security.allowed_commands.clone());
    let report = PreflightChecker::new(&runner)
        .check(&project_path, &config)
        .await;

    for check in &report.checks {
        let mark = if check.passed { "✅" } else { "❌" };
        println!("  {} {}: {}", mark, check.name, check.message);
    }

    match RunStateMachine::load_last(&project_path).await {
        Ok(Some(last)) => {
            println!("\n📋 Last run");
            for line in last.summary().lines() {
                println!("  {}", line);
            }
        }
        Ok(None) => {}
        Err(e) => eprintln!("⚠️  Failed to read last run state: {}", e),
    }

    println!();
    if report.passed && validation.valid {
        println!("✅ Ready to publish");
        Ok(0)
    } else {
        println!("❌ Not ready to publish");
        Ok(1)
    }
}

async fn stats_command(
    project_path: PathBuf,
    days: i64,
    failures_only: bool,
    limit: Option<usize>,
) -> Result<i32> {
    println!("\n📊 Run Statistics\n");

    let mut history = RunHistory::new(&project_path);
    history.initialize().await?;

    let options = HistoryOptions {
        failures_only,
        limit,
        ..HistoryOptions::last_days(days)
    };

    let report = history.generate_report(&options);
    println!("{}", report.markdown_summary);

    Ok(0)
}

async fn init_command(
    project_path: PathBuf,
    config_path: Option<PathBuf>,
    force: bool,
) -> Result<i32> {
    println!("\n🎯 Initialize pages-publisher\n");

    let path = config_path.unwrap_or_else(|| project_path.join(CONFIG_FILENAME));
    if path.exists() && !force {
        eprintln!("⚠️  {} already exists (use --force to overwrite)", path.display());
        return Ok(1);
    }

    let yaml = ConfigLoader::default_config_yaml()?;
    tokio::fs::write(&path, yaml)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("✅ Wrote {}", path.display());
    Ok(0)
}

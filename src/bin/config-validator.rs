//! # Submission Configuration Validator
//!
//! Command-line tool for validating submission configuration across
//! environments before the scheduler is started.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use submission_core::config::{ConfigManager, SubmissionConfig};
use submission_core::constants::operations;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "submission-config-validator")]
#[command(about = "Validate submission configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the effective configuration
    Validate,

    /// Print the effective configuration after all layers are applied
    Show,

    /// List environments that have an override file
    Environments,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Show) => show(&cli),
        Some(Commands::Environments) => list_environments(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration check completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration check failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn config_dir(cli: &Cli) -> PathBuf {
    cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("config"))
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(Some(config_dir(cli)), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate(cli: &Cli) -> Result<()> {
    let manager = load(cli)?;
    let config = manager.config();

    match cli.format.as_str() {
        "json" => {
            let summary = serde_json::json!({
                "environment": manager.environment(),
                "config_directory": manager.config_directory().display().to_string(),
                "valid": true,
                "warnings": warnings(config),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "table" => print_table(&manager),
        other => bail!("unknown output format '{other}'"),
    }
    Ok(())
}

fn print_table(manager: &ConfigManager) {
    let config = manager.config();
    println!("🔧 Submission configuration");
    println!("Environment:       {}", manager.environment());
    println!("Config directory:  {}", manager.config_directory().display());
    println!();

    let scheduler = &config.scheduler;
    println!("📅 Scheduler");
    println!("   submission_enabled:          {}", scheduler.submission_enabled);
    println!("   daily_time (UTC):            {}", scheduler.daily_submission_time());
    println!("   poll_interval_ms:            {}", scheduler.poll_interval_ms);
    println!("   max_concurrent_submissions:  {}", scheduler.max_concurrent_submissions);
    println!(
        "   default_destination:         {}",
        scheduler.default_destination.as_deref().unwrap_or("(none)")
    );

    let retry = &config.retry;
    println!("🔁 Retry");
    println!("   max_retries:    {}", retry.max_retries);
    println!("   base_delay_ms:  {}", retry.base_delay_ms);
    println!("   max_delay_ms:   {}", retry.max_delay_ms);

    let limits = &config.rate_limit;
    println!("⏳ Rate limit");
    println!(
        "   burst {} / {}s, {} per minute, {} per hour, cooldown {}s",
        limits.burst,
        limits.burst_window_seconds,
        limits.per_minute,
        limits.per_hour,
        limits.cooldown_seconds
    );

    println!("🛡️  Circuit breakers (enabled: {})", config.circuit_breaker.enabled);
    for operation in [operations::SUBMIT, operations::STATUS_POLL] {
        let settings = config.circuit_breaker.settings_for_operation(operation);
        println!(
            "   {operation}: threshold {}, cooldown {}s",
            settings.failure_threshold,
            settings.cooldown.as_secs()
        );
    }

    for warning in warnings(config) {
        println!("⚠️  {warning}");
    }
    println!("\n✅ Configuration is valid");
}

/// Valid but probably unintended settings
fn warnings(config: &SubmissionConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if config.scheduler.submission_enabled && config.scheduler.default_destination.is_none() {
        warnings.push(
            "scheduler.default_destination is not set; scheduled runs will fail".to_string(),
        );
    }
    if !config.circuit_breaker.enabled {
        warnings.push("circuit breakers are disabled".to_string());
    }
    if config.rate_limit.burst > config.rate_limit.per_minute {
        warnings.push("rate_limit.burst exceeds rate_limit.per_minute".to_string());
    }
    warnings
}

fn show(cli: &Cli) -> Result<()> {
    let manager = load(cli)?;
    println!("{}", serde_json::to_string_pretty(manager.config())?);
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<()> {
    let dir = config_dir(cli);
    let entries = std::fs::read_dir(&dir)
        .with_context(|| format!("reading configuration directory {}", dir.display()))?;

    let mut environments: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter_map(|name| {
            name.strip_prefix("submission.")
                .and_then(|rest| rest.strip_suffix(".toml"))
                .map(str::to_string)
        })
        .collect();
    environments.sort();

    println!("📋 Environments with overrides in {}:", dir.display());
    for environment in environments {
        println!("  • {environment}");
    }
    Ok(())
}

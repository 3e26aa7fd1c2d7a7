//! # Structured Logging Module
//!
//! Environment-aware structured logging: human-readable console output plus a
//! JSON log file under `log/`, one file per process.

use crate::config::ConfigManager;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Filter precedence: `SUBMISSION_LOG_LEVEL`, then `RUST_LOG`, then the
/// environment default.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = ConfigManager::detect_environment();
        let override_filter = std::env::var("SUBMISSION_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();
        let log_level = resolve_log_filter(&environment, override_filter);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true)
            .with_filter(EnvFilter::new(log_level.clone()));

        let pid = process::id();
        let log_dir = PathBuf::from("log");
        let file_name = format!(
            "{}.{}.{}.log",
            environment,
            pid,
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        // Console-only when the log directory cannot be created
        let file_layer = match fs::create_dir_all(&log_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&log_dir, &file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                // Keep the writer thread alive for the life of the process
                std::mem::forget(guard);
                Some(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_level(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(log_level)),
                )
            }
            Err(_) => None,
        };
        let file_enabled = file_layer.is_some();

        if tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_dir.join(&file_name).display(),
            file_output = file_enabled,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Filter directive for an environment, unless an explicit override is set
fn resolve_log_filter(environment: &str, override_filter: Option<String>) -> String {
    if let Some(filter) = override_filter.filter(|f| !f.trim().is_empty()) {
        return filter;
    }
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for a submission lifecycle step
pub fn log_submission_operation(
    operation: &str,
    submission_key: &str,
    status: &str,
    retry_count: Option<u32>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        submission_key = %submission_key,
        status = %status,
        retry_count = retry_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📤 SUBMISSION_OPERATION"
    );
}

/// Log a resilience state change (breaker transitions, rate-limit cooldowns)
pub fn log_resilience_event(component: &str, operation: &str, event: &str, details: Option<&str>) {
    tracing::warn!(
        component = %component,
        operation = %operation,
        event = %event,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🛡️ RESILIENCE_EVENT"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

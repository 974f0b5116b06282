//! # Webhook Gate CLI Library
//!
//! Command-line interface for operating a webhook gate deployment.
//!
//! This crate provides:
//! - Payload signing with a tenant secret
//! - Sending signed test webhooks to a running gate
//! - Resetting a tenant's rate-limit window through the admin API
//! - Shell completion generation

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use webhook_gate_core::{
    replay::DEFAULT_TIMESTAMP_FIELD, signature::compute_signature, EndpointId, GateConfig,
    TenantId,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Env var holding the tenant signing secret
pub const SECRET_ENV: &str = "WEBHOOK_GATE_SECRET";

/// Env var holding the admin API bearer token
pub const ADMIN_TOKEN_ENV: &str = "WEBHOOK_GATE_ADMIN_TOKEN";

// ============================================================================
// CLI Structure
// ============================================================================

/// Webhook gate command-line interface
#[derive(Parser)]
#[command(
    name = "webhook-gate-cli",
    version = env!("CARGO_PKG_VERSION"),
    about = "Operator tool for the webhook ingestion gate",
    long_about = "Signs webhook payloads, sends signed test requests to a running gate \
                  and manages tenant rate-limit windows through the admin API."
)]
pub struct Cli {
    /// Log level for diagnostics written to stderr
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit diagnostics as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the HMAC-SHA256 signature of a payload
    Sign {
        /// Tenant signing secret
        #[arg(short, long, env = SECRET_ENV, hide_env_values = true)]
        secret: String,

        /// Payload file; stdin is read when omitted
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Send a signed webhook to a running gate
    Send {
        /// Base URL of the gate, e.g. http://localhost:8080
        #[arg(short, long)]
        url: String,

        /// Tenant signing secret
        #[arg(short, long, env = SECRET_ENV, hide_env_values = true)]
        secret: String,

        /// Tenant the payload is sent for
        #[arg(short, long)]
        tenant: String,

        /// Endpoint the webhook is posted to
        #[arg(short, long, default_value = "default")]
        endpoint: String,

        /// Raw JSON body, sent unchanged; a fresh payload is built when omitted
        #[arg(short, long)]
        data: Option<String>,

        /// Header carrying the signature
        #[arg(long, default_value = GateConfig::DEFAULT_SIGNATURE_HEADER)]
        header: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Reset a tenant's rate-limit window for one endpoint
    Reset {
        /// Base URL of the gate, e.g. http://localhost:8080
        #[arg(short, long)]
        url: String,

        /// Admin API bearer token
        #[arg(long, env = ADMIN_TOKEN_ENV, hide_env_values = true)]
        token: String,

        /// Tenant whose window is reset
        #[arg(short, long)]
        tenant: String,

        /// Endpoint whose window is reset
        #[arg(short, long)]
        endpoint: String,

        /// Request timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },
}

impl CliError {
    fn invalid(arg: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg: arg.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Parse arguments from the process and execute the selected command
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);
    run(cli).await
}

/// Execute an already parsed command line
pub async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Sign { secret, file } => execute_sign_command(&secret, file.as_deref()),
        Commands::Send {
            url,
            secret,
            tenant,
            endpoint,
            data,
            header,
            timeout,
        } => {
            execute_send_command(
                &url,
                &secret,
                &tenant,
                &endpoint,
                data.as_deref(),
                &header,
                timeout,
            )
            .await
        }
        Commands::Reset {
            url,
            token,
            tenant,
            endpoint,
            timeout,
        } => execute_reset_command(&url, &token, &tenant, &endpoint, timeout).await,
        Commands::Completions { shell } => execute_completions_command(shell),
    }
}

/// Diagnostics go to stderr so stdout stays pipeable
fn initialize_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("webhook_gate_cli={}", cli.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        eprintln!("Logging was already initialized");
    }
}

// ============================================================================
// Request Construction
// ============================================================================

/// Body for `send` when no explicit data is given
///
/// Carries the tenant id and a `created_at` timestamp with second precision.
pub fn build_payload(tenant: &TenantId, now: DateTime<Utc>) -> Vec<u8> {
    let mut payload = serde_json::Map::new();
    payload.insert(
        "tenant_id".to_string(),
        serde_json::Value::String(tenant.as_str().to_string()),
    );
    payload.insert(
        DEFAULT_TIMESTAMP_FIELD.to_string(),
        serde_json::Value::String(now.to_rfc3339_opts(SecondsFormat::Secs, true)),
    );
    serde_json::Value::Object(payload).to_string().into_bytes()
}

/// Ingestion URL for an endpoint
pub fn webhook_url(base: &str, endpoint: &EndpointId) -> String {
    format!("{}/webhooks/{}", base.trim_end_matches('/'), endpoint.as_str())
}

/// Admin URL resetting a tenant's window
pub fn reset_url(base: &str, tenant: &TenantId, endpoint: &EndpointId) -> String {
    format!(
        "{}/admin/rate-limits/{}/{}/reset",
        base.trim_end_matches('/'),
        tenant.as_str(),
        endpoint.as_str()
    )
}

fn parse_tenant(value: &str) -> Result<TenantId, CliError> {
    TenantId::new(value).map_err(|e| CliError::invalid("tenant", e.to_string()))
}

fn parse_endpoint(value: &str) -> Result<EndpointId, CliError> {
    EndpointId::new(value).map_err(|e| CliError::invalid("endpoint", e.to_string()))
}

fn require_secret(arg: &str, value: &str) -> Result<(), CliError> {
    if value.is_empty() {
        return Err(CliError::invalid(arg, "must not be empty"));
    }
    Ok(())
}

fn read_payload(file: Option<&Path>) -> Result<Vec<u8>, CliError> {
    match file {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut buffer = Vec::new();
            std::io::stdin().read_to_end(&mut buffer)?;
            Ok(buffer)
        }
    }
}

fn http_client(timeout_seconds: u64) -> Result<reqwest::Client, CliError> {
    if timeout_seconds == 0 {
        return Err(CliError::invalid("timeout", "must be at least 1 second"));
    }
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

/// Print the response and fail on non-success statuses
async fn report_response(response: reqwest::Response) -> Result<(), CliError> {
    let status = response.status();
    let body = response.text().await?;

    println!("{}", status);
    if !body.is_empty() {
        println!("{}", body);
    }

    if status.is_success() {
        Ok(())
    } else {
        Err(CliError::CommandFailed {
            message: format!("gate responded with {}", status),
        })
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

fn execute_sign_command(secret: &str, file: Option<&Path>) -> Result<(), CliError> {
    require_secret("secret", secret)?;
    let body = read_payload(file)?;
    debug!(bytes = body.len(), "Signing payload");

    println!("{}", compute_signature(secret.as_bytes(), &body));
    Ok(())
}

async fn execute_send_command(
    url: &str,
    secret: &str,
    tenant: &str,
    endpoint: &str,
    data: Option<&str>,
    header: &str,
    timeout_seconds: u64,
) -> Result<(), CliError> {
    require_secret("secret", secret)?;
    let tenant = parse_tenant(tenant)?;
    let endpoint = parse_endpoint(endpoint)?;

    let body = match data {
        Some(raw) => raw.as_bytes().to_vec(),
        None => build_payload(&tenant, Utc::now()),
    };
    let signature = compute_signature(secret.as_bytes(), &body);
    let target = webhook_url(url, &endpoint);

    info!(url = %target, tenant_id = %tenant, bytes = body.len(), "Sending signed webhook");

    let response = http_client(timeout_seconds)?
        .post(&target)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header(header, signature)
        .body(body)
        .send()
        .await?;

    report_response(response).await
}

async fn execute_reset_command(
    url: &str,
    token: &str,
    tenant: &str,
    endpoint: &str,
    timeout_seconds: u64,
) -> Result<(), CliError> {
    require_secret("token", token)?;
    let tenant = parse_tenant(tenant)?;
    let endpoint = parse_endpoint(endpoint)?;
    let target = reset_url(url, &tenant, &endpoint);

    info!(url = %target, "Resetting rate-limit window");

    let response = http_client(timeout_seconds)?
        .post(&target)
        .bearer_auth(token)
        .send()
        .await?;

    report_response(response).await
}

fn execute_completions_command(shell: clap_complete::Shell) -> Result<(), CliError> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "webhook-gate-cli", &mut std::io::stdout());
    Ok(())
}

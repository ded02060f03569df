// # fbxconf - Freebox desired-state applier
//
// Thin front end over fbxconf-core:
// 1. Reading configuration from environment variables
// 2. Loading and validating the desired-state file
// 3. Building the Freebox client and the reconciler
// 4. Applying every entry in order, printing one JSON report per entry
//
// Reconciliation logic lives in fbxconf-core; nothing here decides what to
// write to the router.
//
// ## Configuration
//
// - `FBX_DESIRED_PATH`: desired-state JSON file (required)
// - `FBX_SESSION_TOKEN`: Freebox session token (required)
// - `FBX_URL`: router host or base URL, overrides the file
// - `FBX_API_VERSION`: API version segment, e.g. `v4`, overrides the file
// - `FBX_TIMEOUT_SECS`: HTTP timeout in seconds (1-300), overrides the file
// - `FBX_MODE`: `dry-run` to diff without writing, `live` (default)
// - `FBX_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Output
//
// Reports go to stdout, one JSON object per line. Logs go to stderr.
//
// ## Example
//
// ```bash
// export FBX_DESIRED_PATH=/etc/fbxconf/desired.json
// export FBX_SESSION_TOKEN=...
// export FBX_MODE=dry-run
//
// fbxconf
// ```

use anyhow::{Context, Result};
use fbxconf_core::{Action, FbxConfig, Outcome, Reconciler, Report};
use fbxconf_freebox::{FreeboxClient, StaticSession};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Every entry applied (or already in place)
/// - 1: Configuration or startup error, nothing applied
/// - 2: At least one entry failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FbxExitCode {
    /// All entries succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// At least one entry failed
    EntriesFailed = 2,
}

impl From<FbxExitCode> for ExitCode {
    fn from(code: FbxExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    desired_path: PathBuf,
    session_token: String,
    url: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    mode: String,
    log_level: String,
}

// Custom Debug implementation that hides the session token
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("desired_path", &self.desired_path)
            .field("session_token", &"<REDACTED>")
            .field("url", &self.url)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("mode", &self.mode)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            desired_path: lookup("FBX_DESIRED_PATH")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .context(
                    "FBX_DESIRED_PATH is required. \
                    Set it via: export FBX_DESIRED_PATH=/etc/fbxconf/desired.json",
                )?,
            session_token: lookup("FBX_SESSION_TOKEN").unwrap_or_default(),
            url: lookup("FBX_URL"),
            api_version: lookup("FBX_API_VERSION"),
            timeout_secs: lookup("FBX_TIMEOUT_SECS")
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .with_context(|| format!("FBX_TIMEOUT_SECS must be a number. Got: {s}"))
                })
                .transpose()?,
            mode: lookup("FBX_MODE").unwrap_or_else(|| "live".to_string()),
            log_level: lookup("FBX_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.session_token.trim().is_empty() {
            anyhow::bail!(
                "FBX_SESSION_TOKEN is required. \
                Set it via: export FBX_SESSION_TOKEN=your_session_token"
            );
        }

        if let Some(timeout) = self.timeout_secs
            && !(1..=300).contains(&timeout)
        {
            anyhow::bail!(
                "FBX_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                timeout
            );
        }

        match self.mode.to_lowercase().as_str() {
            "live" | "dry-run" => {}
            _ => anyhow::bail!(
                "FBX_MODE '{}' is not valid. Valid modes: live, dry-run",
                self.mode
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "FBX_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn dry_run(&self) -> bool {
        self.mode.eq_ignore_ascii_case("dry-run")
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Read the desired-state file and apply environment overrides
    fn load_desired(&self) -> Result<FbxConfig> {
        let mut desired = FbxConfig::from_file(&self.desired_path)?;

        if let Some(url) = &self.url {
            desired.router.url = url.clone();
        }
        if let Some(version) = &self.api_version {
            desired.router.api_version = version.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            desired.router.timeout_secs = timeout;
        }
        if self.dry_run() {
            desired.reconciler.dry_run = true;
        }

        desired.validate()?;
        Ok(desired)
    }
}

/// Per-action tally of a run
#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    created: usize,
    updated: usize,
    deleted: usize,
    unchanged: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome.action {
            Action::Created => self.created += 1,
            Action::Updated => self.updated += 1,
            Action::Deleted => self.deleted += 1,
            Action::Unchanged => self.unchanged += 1,
            Action::Failed => self.failed += 1,
        }
    }

    fn exit_code(&self) -> FbxExitCode {
        if self.failed > 0 {
            FbxExitCode::EntriesFailed
        } else {
            FbxExitCode::Success
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return FbxExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return FbxExitCode::ConfigError.into();
    }

    // Logs on stderr, reports on stdout
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level())
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FbxExitCode::ConfigError.into();
    }

    let desired = match config.load_desired() {
        Ok(desired) => desired,
        Err(e) => {
            error!("Cannot load desired state: {:#}", e);
            return FbxExitCode::ConfigError.into();
        }
    };

    info!(
        "Loaded {} resource(s) from {}",
        desired.resources.len(),
        config.desired_path.display()
    );
    if desired.reconciler.dry_run {
        warn!("Running in DRY-RUN mode - no changes will be made");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FbxExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        match run(config, desired).await {
            Ok(summary) => summary.exit_code(),
            Err(e) => {
                error!("Startup error: {:#}", e);
                FbxExitCode::ConfigError
            }
        }
    });

    result.into()
}

/// Apply every entry in order
async fn run(config: Config, desired: FbxConfig) -> Result<Summary> {
    let session = Arc::new(StaticSession::new(config.session_token)?);
    let client = Arc::new(FreeboxClient::new(&desired.router, session)?);
    info!("Using Freebox API at {}", client.base_url());

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reconciler = Reconciler::with_client(client)
        .with_dry_run(desired.reconciler.dry_run)
        .with_cancellation(cancel_rx);

    // In-flight entries always finish; a signal only stops the next ones.
    let signals = tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => {
                warn!("Received {}, skipping remaining entries", signal);
                let _ = cancel_tx.send(true);
            }
            Err(e) => error!("Signal handling unavailable: {}", e),
        }
    });

    let mut summary = Summary::default();
    for entry in &desired.resources {
        let outcome = reconciler.apply(entry).await;
        summary.record(&outcome);
        println!("{}", Report::from(&outcome).to_json()?);
    }
    signals.abort();

    info!(
        "Done: {} created, {} updated, {} deleted, {} unchanged, {} failed",
        summary.created, summary.updated, summary.deleted, summary.unchanged, summary.failed
    );

    Ok(summary)
}

/// Wait for a shutdown signal (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for a shutdown signal (CTRL-C only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

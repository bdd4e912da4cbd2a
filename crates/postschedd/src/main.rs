// # postschedd - Post Scheduler Daemon
//
// Thin integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering providers and building the schedule store
// 4. Running the publish dispatcher and the optional follower tracker
//
// Scheduling, retry and diff logic live in postsched-core. Nothing here
// decides when a post is published.
//
// ## Configuration
//
// ### Store
// - `POSTSCHED_STORE_TYPE`: file or memory (default: file)
// - `POSTSCHED_STORE_PATH`: Path to the store file (for file)
//
// ### Provider
// - `POSTSCHED_PROVIDER_TYPE`: Provider type (default: http)
// - `POSTSCHED_PROVIDER_BASE_URL`: Gateway base URL
// - `POSTSCHED_PROVIDER_TOKEN`: Token of the default account
//
// ### Accounts
// - `POSTSCHED_ACCOUNTS`: Comma-separated `name` or `name=token` entries
// - `POSTSCHED_OBSERVE_ACCOUNT`: Account whose followers are tracked (optional)
//
// ### Timing
// - `POSTSCHED_SCAN_INTERVAL_SECS`: Dispatcher scan period (default: 60)
// - `POSTSCHED_MAX_ATTEMPTS`: Publish attempts per visit (default: 3)
// - `POSTSCHED_RETRY_DELAY_SECS`: Cooling-off between attempts (default: 300)
// - `POSTSCHED_PUBLISH_TIMEOUT_SECS`: Deadline per provider call (default: 120)
// - `POSTSCHED_TRACKER_INTERVAL_SECS`: Follower reconcile period (default: 3600)
//
// ### Logging
// - `POSTSCHED_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ## Example
//
// ```bash
// export POSTSCHED_STORE_PATH=/var/lib/postsched/schedule.json
// export POSTSCHED_PROVIDER_BASE_URL=https://graph.example.com/v1
// export POSTSCHED_PROVIDER_TOKEN=your_token
// export POSTSCHED_ACCOUNTS=acme=acme_token,globex
// export POSTSCHED_OBSERVE_ACCOUNT=acme
//
// postschedd
// ```

use anyhow::{Context, Result};
use postsched_core::{
    AccountConfig, AccountRegistry, DispatcherConfig, EventSink, FollowerTracker,
    ProviderConfig, ProviderRegistry, PublishDispatcher, ScheduleStore, SchedulerConfig,
    SchedulerEvent, StoreConfig, SystemClock, TrackerConfig,
};
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum PostschedExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<PostschedExitCode> for ExitCode {
    fn from(code: PostschedExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    store_type: String,
    store_path: Option<String>,
    provider_type: String,
    provider_base_url: String,
    provider_token: String,
    accounts: Vec<AccountConfig>,
    observe_account: Option<String>,
    scan_interval_secs: u64,
    max_attempts: u32,
    retry_delay_secs: u64,
    publish_timeout_secs: u64,
    tracker_interval_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = DispatcherConfig::default();

        Ok(Self {
            store_type: lookup("POSTSCHED_STORE_TYPE").unwrap_or_else(|| "file".to_string()),
            store_path: lookup("POSTSCHED_STORE_PATH"),
            provider_type: lookup("POSTSCHED_PROVIDER_TYPE")
                .unwrap_or_else(|| "http".to_string()),
            provider_base_url: lookup("POSTSCHED_PROVIDER_BASE_URL").unwrap_or_default(),
            provider_token: lookup("POSTSCHED_PROVIDER_TOKEN").unwrap_or_default(),
            accounts: parse_accounts(&lookup("POSTSCHED_ACCOUNTS").unwrap_or_default())?,
            observe_account: lookup("POSTSCHED_OBSERVE_ACCOUNT")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            scan_interval_secs: parse_var(
                &lookup,
                "POSTSCHED_SCAN_INTERVAL_SECS",
                defaults.scan_interval_secs,
            )?,
            max_attempts: parse_var(&lookup, "POSTSCHED_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay_secs: parse_var(
                &lookup,
                "POSTSCHED_RETRY_DELAY_SECS",
                defaults.retry_delay_secs,
            )?,
            publish_timeout_secs: parse_var(
                &lookup,
                "POSTSCHED_PUBLISH_TIMEOUT_SECS",
                defaults.publish_timeout_secs,
            )?,
            tracker_interval_secs: parse_var(
                &lookup,
                "POSTSCHED_TRACKER_INTERVAL_SECS",
                TrackerConfig::default().interval_secs,
            )?,
            log_level: lookup("POSTSCHED_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the daemon-level settings
    ///
    /// Section-level checks (URL scheme, intervals, duplicate accounts) run
    /// afterwards through `SchedulerConfig::validate`.
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "file" => match self.store_path.as_deref() {
                None | Some("") => anyhow::bail!(
                    "POSTSCHED_STORE_PATH is required when POSTSCHED_STORE_TYPE=file. \
                    Set it via: export POSTSCHED_STORE_PATH=/var/lib/postsched/schedule.json"
                ),
                Some(path) => {
                    if let Some(parent) = std::path::Path::new(path).parent()
                        && !parent.as_os_str().is_empty()
                        && !parent.exists()
                    {
                        anyhow::bail!(
                            "POSTSCHED_STORE_PATH parent directory does not exist: {}. \
                            Create it first: sudo mkdir -p {}",
                            parent.display(),
                            parent.display()
                        );
                    }
                }
            },
            "memory" => {}
            _ => anyhow::bail!(
                "POSTSCHED_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.store_type
            ),
        }

        match self.provider_type.as_str() {
            "http" => {}
            _ => anyhow::bail!(
                "POSTSCHED_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: http",
                self.provider_type
            ),
        }

        if self.provider_base_url.is_empty() {
            anyhow::bail!(
                "POSTSCHED_PROVIDER_BASE_URL is required. \
                Set it via: export POSTSCHED_PROVIDER_BASE_URL=https://graph.example.com/v1"
            );
        }

        if self.provider_token.is_empty() {
            anyhow::bail!(
                "POSTSCHED_PROVIDER_TOKEN is required. \
                Set it via: export POSTSCHED_PROVIDER_TOKEN=your_token"
            );
        }

        let token_lower = self.provider_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "POSTSCHED_PROVIDER_TOKEN appears to be a placeholder. \
                Use an actual access token."
            );
        }

        if self.provider_base_url.starts_with("http://") {
            eprintln!(
                "WARNING: POSTSCHED_PROVIDER_BASE_URL uses HTTP (not HTTPS). \
                Access tokens will travel in clear text."
            );
        }

        if let Some(observed) = &self.observe_account
            && !self.accounts.iter().any(|a| &a.name == observed)
        {
            // Listing only needs a name, so this is allowed but usually a typo
            eprintln!(
                "WARNING: POSTSCHED_OBSERVE_ACCOUNT '{}' is not in POSTSCHED_ACCOUNTS",
                observed
            );
        }

        if !(1..=10).contains(&self.max_attempts) {
            anyhow::bail!(
                "POSTSCHED_MAX_ATTEMPTS must be between 1 and 10. Got: {}",
                self.max_attempts
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "POSTSCHED_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration
    fn scheduler_config(&self) -> SchedulerConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::File {
                path: self.store_path.clone().unwrap_or_default(),
            },
        };

        SchedulerConfig {
            store,
            provider: ProviderConfig::Http {
                base_url: self.provider_base_url.clone(),
                access_token: self.provider_token.clone(),
            },
            accounts: self.accounts.clone(),
            dispatcher: DispatcherConfig {
                scan_interval_secs: self.scan_interval_secs,
                max_attempts: self.max_attempts,
                retry_delay_secs: self.retry_delay_secs,
                publish_timeout_secs: self.publish_timeout_secs,
                ..DispatcherConfig::default()
            },
            tracker: TrackerConfig {
                account: self.observe_account.clone(),
                interval_secs: self.tracker_interval_secs,
                fetch_timeout_secs: self.publish_timeout_secs,
            },
        }
    }
}

/// Parse `name` / `name=token` entries separated by commas
fn parse_accounts(raw: &str) -> Result<Vec<AccountConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, token)) => {
                let (name, token) = (name.trim(), token.trim());
                if name.is_empty() || token.is_empty() {
                    anyhow::bail!("POSTSCHED_ACCOUNTS entry '{}' is malformed", entry);
                }
                Ok(AccountConfig::new(name).with_access_token(token))
            }
            None => Ok(AccountConfig::new(entry)),
        })
        .collect()
}

/// Parse an optional numeric variable, falling back to `default` when unset
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number. Got: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return PostschedExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PostschedExitCode::ConfigError.into();
    }

    let scheduler_config = config.scheduler_config();
    if let Err(e) = scheduler_config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return PostschedExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return PostschedExitCode::ConfigError.into();
    }

    info!("Starting postschedd daemon");
    info!(
        "Configuration loaded: {} named account(s), store '{}'",
        scheduler_config.accounts.len(),
        scheduler_config.store.type_name()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return PostschedExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(scheduler_config).await {
            Ok(()) => PostschedExitCode::CleanShutdown,
            Err(DaemonError::Startup(e)) => {
                error!("Startup failed: {:#}", e);
                PostschedExitCode::ConfigError
            }
            Err(DaemonError::Runtime(e)) => {
                error!("Daemon error: {:#}", e);
                PostschedExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Where the daemon failed, for exit code selection
enum DaemonError {
    Startup(anyhow::Error),
    Runtime(anyhow::Error),
}

/// Run the daemon
async fn run_daemon(config: SchedulerConfig) -> Result<(), DaemonError> {
    let registry = ProviderRegistry::with_builtin_stores();

    #[cfg(feature = "http")]
    {
        info!("Registering HTTP gateway provider");
        postsched_provider_http::register(&registry);
    }

    let backend = registry
        .create_store(&config.store)
        .await
        .context("Failed to open schedule store")
        .map_err(DaemonError::Startup)?;
    let store = ScheduleStore::new(Arc::from(backend));

    let accounts = AccountRegistry::from_config(&registry, &config)
        .context("Failed to create publishing accounts")
        .map_err(DaemonError::Startup)?;
    info!("Publishing accounts: default + {:?}", accounts.list());

    let (events, event_rx) = EventSink::channel(config.dispatcher.event_channel_capacity);
    let event_log = tokio::spawn(log_events(event_rx));

    let dispatcher = PublishDispatcher::new(
        store,
        Arc::new(accounts),
        Arc::new(SystemClock),
        &config.dispatcher,
        events.clone(),
    )
    .context("Failed to create dispatcher")
    .map_err(DaemonError::Startup)?;

    let tracker = match &config.tracker.account {
        Some(account) => {
            let source = registry
                .create_listing_source(&config.provider)
                .context("Failed to create follower listing source")
                .map_err(DaemonError::Startup)?;
            let tracker = FollowerTracker::new(Arc::from(source), &config.tracker, events)
                .context("Failed to create follower tracker")
                .map_err(DaemonError::Startup)?;
            info!("Tracking followers of '{}'", account);
            Some(tracker)
        }
        None => {
            info!("No observed account configured; follower tracking disabled");
            drop(events);
            None
        }
    };

    let (dispatcher_tx, dispatcher_rx) = oneshot::channel();
    let dispatcher_task =
        tokio::spawn(async move { dispatcher.run_with_shutdown(Some(dispatcher_rx)).await });

    let tracker_task = tracker.map(|tracker| {
        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(async move { tracker.run_with_shutdown(Some(rx)).await });
        (tx, handle)
    });

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await.map_err(DaemonError::Runtime)?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    // A send error means the loop already exited; its join result says why
    let _ = dispatcher_tx.send(());
    let mut failure = join_component("dispatcher", dispatcher_task).await;

    if let Some((tx, handle)) = tracker_task {
        let _ = tx.send(());
        if let Some(e) = join_component("tracker", handle).await {
            failure.get_or_insert(e);
        }
    }

    // Every sender is gone once both loops have returned
    if let Err(e) = event_log.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    match failure {
        Some(e) => Err(DaemonError::Runtime(e)),
        None => Ok(()),
    }
}

/// Await a component task and turn its outcome into an optional error
async fn join_component(
    name: &str,
    handle: tokio::task::JoinHandle<postsched_core::Result<()>>,
) -> Option<anyhow::Error> {
    match handle.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            error!("{} failed during shutdown: {}", name, e);
            Some(e.into())
        }
        Err(e) => {
            error!("{} task panicked or was cancelled: {}", name, e);
            Some(anyhow::anyhow!("{} task failed: {}", name, e))
        }
    }
}

/// Turn scheduler events into log lines
async fn log_events(rx: mpsc::Receiver<SchedulerEvent>) {
    let mut events = ReceiverStream::new(rx);

    while let Some(event) = events.next().await {
        match event {
            SchedulerEvent::ScanStarted { pending, due } => {
                if due > 0 {
                    info!("Scan: {} due of {} pending", due, pending);
                }
            }
            SchedulerEvent::PublishAttemptFailed {
                post_id,
                attempt,
                error,
            } => warn!("Attempt {} for post {} failed: {}", attempt, post_id, error),
            SchedulerEvent::PostPublished {
                post_id,
                account,
                media_id,
            } => info!(
                "Post {} published for '{}' as media {}",
                post_id, account, media_id
            ),
            SchedulerEvent::PostCancelled { post_id } => {
                info!("Post {} was cancelled before publishing", post_id)
            }
            SchedulerEvent::PostDeferred { post_id, attempts } => warn!(
                "Post {} deferred to the next scan after {} attempt(s)",
                post_id, attempts
            ),
            SchedulerEvent::PostAbandoned { post_id, reason } => {
                error!("Post {} abandoned: {}", post_id, reason)
            }
            SchedulerEvent::FollowerCountObserved { account, count } => {
                info!("'{}' has {} follower(s)", account, count)
            }
            SchedulerEvent::FollowersReconciled {
                account,
                added,
                unfollowed,
                ..
            } => info!(
                "'{}' followers reconciled: {} new, {} unfollowed {:?}",
                account,
                added,
                unfollowed.len(),
                unfollowed
            ),
            SchedulerEvent::ReconcileFailed { account, error } => {
                warn!("Follower reconcile for '{}' failed: {}", account, error)
            }
            SchedulerEvent::Stopped { component, reason } => {
                info!("{} stopped: {}", component, reason)
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}

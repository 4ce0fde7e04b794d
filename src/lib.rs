//! oamfuture-signup
//!
//! Batch signup automation for the oamfuture signup page: generates candidate
//! phone-number identifiers into a CSV record store, drives a Chrome session
//! through the signup form for each pending identifier, and optionally
//! rotates the outbound IP through a scraped free-proxy pool.

pub mod browser;
pub mod proxy;
pub mod runner;
pub mod store;

use std::path::PathBuf;

use tracing::{error, info, warn};

use store::CollisionPolicy;

/// Default inter-submission delay in seconds
fn default_interval() -> u64 {
    10
}

/// Default rotation modulus (rotate proxy every N submissions)
fn default_rotate_every() -> u64 {
    5
}

/// Default batch size: one draw per possible 5-digit suffix
fn default_batch_size() -> usize {
    100_000
}

/// Default result indicator timeout in seconds
fn default_result_timeout() -> u64 {
    10
}

fn default_prefix() -> String {
    store::DEFAULT_PREFIX.to_string()
}

fn default_target_url() -> String {
    browser::TARGET_URL.to_string()
}

fn default_proxy_source_url() -> String {
    proxy::DEFAULT_SOURCE_URL.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("numbers_status.csv")
}

/// Run configuration, resolved once before the core loop starts. The core
/// never blocks on interactive input.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunConfig {
    /// Run the browser in headless mode
    pub headless: bool,
    /// Fixed delay between submissions, in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Rotate the outbound proxy during the run
    pub proxy_mode: bool,
    /// What to do when generation finds an existing store file
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    /// Number of identifiers per generated batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Fixed identifier prefix
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Signup page URL
    #[serde(default = "default_target_url")]
    pub target_url: String,
    /// Proxy list source URL
    #[serde(default = "default_proxy_source_url")]
    pub proxy_source_url: String,
    /// Rotate the proxy every N submissions
    #[serde(default = "default_rotate_every")]
    pub rotate_every: u64,
    /// Record store file path
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// How long to wait for the result indicator, in seconds
    #[serde(default = "default_result_timeout")]
    pub result_timeout_secs: u64,
    /// Explicit Chrome executable path; auto-detected when unset
    #[serde(default)]
    pub chrome_path: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            headless: true,
            interval_secs: default_interval(),
            proxy_mode: false,
            collision_policy: CollisionPolicy::default(),
            batch_size: default_batch_size(),
            prefix: default_prefix(),
            target_url: default_target_url(),
            proxy_source_url: default_proxy_source_url(),
            rotate_every: default_rotate_every(),
            store_path: default_store_path(),
            result_timeout_secs: default_result_timeout(),
            chrome_path: None,
        }
    }
}

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("oamfuture-signup").join("logs"))
}

impl RunConfig {
    /// Get config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("oamfuture-signup").join("config.json"))
    }

    /// Load config from file
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {:?}", path);
                            return config;
                        }
                        Err(e) => {
                            warn!("Failed to parse config file: {}", e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read config file: {}", e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Failed to create config directory: {}", e);
                    return;
                }
            }

            match serde_json::to_string_pretty(self) {
                Ok(content) => {
                    if let Err(e) = std::fs::write(&path, content) {
                        error!("Failed to save config: {}", e);
                    } else {
                        info!("Config saved to {:?}", path);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize config: {}", e);
                }
            }
        }
    }

    /// Validate operator-supplied values before the core runs.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval must be greater than zero".into());
        }
        if self.rotate_every == 0 {
            return Err("rotation modulus must be greater than zero".into());
        }
        if self.prefix.is_empty() || !self.prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("prefix must be numeric, got {:?}", self.prefix));
        }
        url::Url::parse(&self.target_url)
            .map_err(|e| format!("invalid target URL {:?}: {}", self.target_url, e))?;
        url::Url::parse(&self.proxy_source_url)
            .map_err(|e| format!("invalid proxy source URL {:?}: {}", self.proxy_source_url, e))?;
        Ok(())
    }
}

/// Initialize logging: console layer plus a daily-rolling file under the
/// config directory.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "oamfuture-signup.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}

//! Run controller: owns the submission loop and all cross-identifier state.
//!
//! States are Idle -> Running -> {Completed, Aborted}. Failures in shared
//! setup (store load, proxy fetch, session launch) abort before any
//! identifier is processed; failures scoped to one identifier are logged,
//! recorded as fail, and the loop continues.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::browser::{BrowserError, Outcome, Session, SessionConfig, SignupDriver};
use crate::proxy::{fetch_proxy_pool, FetchError, ProxyEndpoint, ProxyPool};
use crate::store::{RecordStore, Status, StoreError};
use crate::RunConfig;

/// Errors that abort a run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("proxy pool fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("browser session error: {0}")]
    Browser(#[from] BrowserError),
}

/// Cross-identifier state for one controller invocation. Discarded at normal
/// or abnormal termination; the record store is the only thing that survives.
struct RunState {
    visit_count: u64,
    active_proxy: Option<ProxyEndpoint>,
}

/// Counters reported at the end of a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Subset of `failed` caused by automation errors rather than a form
    /// rejection.
    pub errors: usize,
}

/// True when the given visit should trigger a proxy rotation. Never fires on
/// the first visit.
pub fn should_rotate(visit_count: u64, rotate_every: u64) -> bool {
    rotate_every > 0 && visit_count > 0 && visit_count % rotate_every == 0
}

/// Status written to the store for a given submission outcome. Unknown is
/// recorded as fail: an unconfirmed signup must stay retriable by operator
/// action, never pass as success.
pub fn outcome_status(outcome: Outcome) -> Status {
    match outcome {
        Outcome::Success => Status::Success,
        Outcome::Fail | Outcome::Unknown => Status::Fail,
    }
}

/// Sequential driver of the whole batch.
pub struct RunController {
    config: RunConfig,
    store: RecordStore,
}

impl RunController {
    pub fn new(config: RunConfig) -> Self {
        let store = RecordStore::open(&config.store_path);
        Self { config, store }
    }

    /// Process every pending identifier in the store.
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        // Shared setup; any failure here aborts with nothing processed.
        let pending = self.store.load_pending()?;
        if pending.is_empty() {
            info!("No pending identifiers in {}", self.store.path().display());
            return Ok(RunSummary::default());
        }
        info!("Loaded {} pending identifiers", pending.len());

        let pool = if self.config.proxy_mode {
            let pool = fetch_proxy_pool(&self.config.proxy_source_url).await?;
            info!("Generated {} proxy addresses", pool.len());
            Some(pool)
        } else {
            None
        };

        // Initial session runs without a proxy; rotation attaches one later.
        let mut session = Session::open(self.session_config(None)).await?;
        let mut state = RunState {
            visit_count: 0,
            active_proxy: None,
        };

        let result = self
            .process_pending(&mut session, &mut state, pool.as_ref(), &pending)
            .await;

        // Session teardown happens on every exit path, abort included.
        session.close().await;

        let summary = result?;
        info!(
            "Run completed: {} processed, {} succeeded, {} failed ({} automation errors)",
            summary.processed, summary.succeeded, summary.failed, summary.errors
        );
        Ok(summary)
    }

    async fn process_pending(
        &self,
        session: &mut Session,
        state: &mut RunState,
        pool: Option<&ProxyPool>,
        pending: &[String],
    ) -> Result<RunSummary, RunError> {
        let driver = SignupDriver::new(
            self.config.target_url.clone(),
            self.config.result_timeout_secs,
        );
        let mut summary = RunSummary::default();

        for identifier in pending {
            state.visit_count += 1;

            if let Some(pool) = pool {
                if should_rotate(state.visit_count, self.config.rotate_every) {
                    self.rotate_session(session, state, pool).await?;
                }
            }

            summary.processed += 1;
            match driver.submit(session, identifier).await {
                Ok(outcome) => {
                    if outcome == Outcome::Success {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    self.store
                        .update_status(identifier, outcome_status(outcome))?;
                }
                Err(e) => {
                    // One identifier's automation failure never aborts the
                    // batch; record it and move on.
                    summary.failed += 1;
                    summary.errors += 1;
                    match &state.active_proxy {
                        Some(proxy) => warn!(
                            "Submission error for {} via proxy {}: {}",
                            identifier, proxy, e
                        ),
                        None => warn!("Submission error for {}: {}", identifier, e),
                    }
                    self.store.update_status(identifier, Status::Fail)?;
                }
            }

            tokio::time::sleep(Duration::from_secs(self.config.interval_secs)).await;

            if let Err(e) = session.reload().await {
                warn!("Page reload failed: {}", e);
            }
        }

        Ok(summary)
    }

    /// Tear down the current session and open a fresh one behind a randomly
    /// picked pool endpoint. A launch failure here aborts the run: the
    /// session is shared setup, not per-identifier work.
    async fn rotate_session(
        &self,
        session: &mut Session,
        state: &mut RunState,
        pool: &ProxyPool,
    ) -> Result<(), RunError> {
        let Some(endpoint) = pool.pick() else {
            warn!("Proxy pool is empty, keeping current session");
            return Ok(());
        };

        info!(
            "Visit {}: rotating proxy to {}",
            state.visit_count, endpoint
        );

        session.close().await;
        *session = Session::open(self.session_config(Some(endpoint))).await?;
        state.active_proxy = Some(endpoint.clone());
        Ok(())
    }

    fn session_config(&self, proxy: Option<&ProxyEndpoint>) -> SessionConfig {
        SessionConfig::default()
            .headless(self.config.headless)
            .chrome_path(self.config.chrome_path.clone())
            .proxy(proxy.map(|p| p.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_fires_on_every_fifth_visit() {
        let rotations: Vec<u64> = (1..=10).filter(|&v| should_rotate(v, 5)).collect();
        assert_eq!(rotations, vec![5, 10]);
    }

    #[test]
    fn rotation_never_fires_on_first_visit() {
        for modulus in 1..=10 {
            if modulus > 1 {
                assert!(!should_rotate(1, modulus));
            }
        }
    }

    #[test]
    fn rotation_disabled_with_zero_modulus() {
        assert!((1..=100).all(|v| !should_rotate(v, 0)));
    }

    #[test]
    fn unknown_outcome_maps_to_fail() {
        assert_eq!(outcome_status(Outcome::Success), Status::Success);
        assert_eq!(outcome_status(Outcome::Fail), Status::Fail);
        assert_eq!(outcome_status(Outcome::Unknown), Status::Fail);
    }
}

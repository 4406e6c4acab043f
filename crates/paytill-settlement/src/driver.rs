//! Periodic settlement sweep loop
//!
//! The driver owns nothing but a handle to the engine: it wakes on a fixed
//! interval, runs one [`SettlementEngine::run_due`] sweep, and logs the
//! report. Hosts stop it by aborting the returned task handle.

use std::env;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::engine::SettlementEngine;

/// Environment variable overriding the sweep interval, in seconds
pub const SETTLE_INTERVAL_ENV: &str = "PAYTILL_SETTLE_INTERVAL_SECS";

const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Settlement driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Time between settlement sweeps
    pub interval: Duration,
}

impl DriverConfig {
    /// Read configuration from the environment, falling back to an hourly
    /// sweep when `PAYTILL_SETTLE_INTERVAL_SECS` is unset or unparsable
    pub fn from_env() -> Self {
        let interval_secs = env::var(SETTLE_INTERVAL_ENV)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        Self {
            interval: Duration::from_secs(interval_secs),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
        }
    }
}

/// Background task settling due schedules on a fixed interval.
pub struct SettlementDriver {
    engine: SettlementEngine,
    config: DriverConfig,
}

impl SettlementDriver {
    /// Create a driver over a settlement engine
    pub fn new(engine: SettlementEngine, config: DriverConfig) -> Self {
        Self { engine, config }
    }

    /// Spawn the sweep loop: one sweep immediately, then one per interval.
    ///
    /// The loop runs until the returned handle is aborted. Per-owner failures
    /// are already absorbed into the report by the engine, so the loop itself
    /// never exits on error.
    pub fn start(&self) -> JoinHandle<()> {
        let engine = self.engine.clone();
        let interval = self.config.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let report = engine.run_due(Utc::now()).await;
                if report.failed > 0 {
                    error!(?report, "settlement sweep finished with failures");
                } else {
                    info!(?report, "settlement sweep finished");
                }
            }
        })
    }
}

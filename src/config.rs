//! Centralised configuration, loaded from the environment after `.env`.
//!
//! All parameters the pipeline is tunable on are defined here; every
//! component borrows `&Config` rather than hardcoding defaults inline.

use anyhow::Result;
use std::env;

/// Default top-N depth captured and featurised.
pub const DEFAULT_DEPTH_LEVELS: usize = 10;
/// Default bound on trade/tick/event deques.
pub const DEFAULT_ROLLING_WINDOW: usize = 1800;
/// Default bound on mid/spread deques.
pub const DEFAULT_MID_HISTORY: usize = 1800;
/// Default normaliser window length.
pub const DEFAULT_WINDOW_SIZE: usize = 30_000;
/// Default feature emission period, in nanoseconds.
pub const DEFAULT_SNAPSHOT_INTERVAL_NS: u64 = 500_000_000;
/// Default mid/spread sampling period, in nanoseconds.
pub const DEFAULT_MID_SAMPLE_INTERVAL_NS: u64 = 50_000_000;
/// Default numeric id mask for the futures front-month filter.
pub const DEFAULT_FRONT_MONTH_ID: u32 = 4916;
/// Session start, UTC hour/minute.
pub const DEFAULT_SESSION_START_HMS: (u32, u32, u32) = (13, 30, 0);
/// Session end, UTC hour/minute.
pub const DEFAULT_SESSION_END_HMS: (u32, u32, u32) = (20, 0, 0);

/// All process-start-resolved tunables for an `OrderEngine`/`Pipeline` run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Top-N depth captured and featurised.
    pub depth_levels: usize,
    /// Bound on trade/tick/event deques.
    pub rolling_window: usize,
    /// Bound on mid/spread deques.
    pub mid_history: usize,
    /// Normaliser window length.
    pub window_size: usize,
    /// Feature emission period, in nanoseconds.
    pub snapshot_interval_ns: u64,
    /// Mid/spread sampling period, in nanoseconds.
    pub mid_sample_interval_ns: u64,
    /// Numeric id mask for the futures front-month filter.
    pub front_month_id: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            depth_levels: DEFAULT_DEPTH_LEVELS,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            mid_history: DEFAULT_MID_HISTORY,
            window_size: DEFAULT_WINDOW_SIZE,
            snapshot_interval_ns: DEFAULT_SNAPSHOT_INTERVAL_NS,
            mid_sample_interval_ns: DEFAULT_MID_SAMPLE_INTERVAL_NS,
            front_month_id: DEFAULT_FRONT_MONTH_ID,
        }
    }
}

impl Config {
    /// Load configuration from environment variables (after `.env`),
    /// falling back to the documented defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            depth_levels: parse_env("DEPTH_LEVELS", DEFAULT_DEPTH_LEVELS)?,
            rolling_window: parse_env("ROLLING_WINDOW", DEFAULT_ROLLING_WINDOW)?,
            mid_history: parse_env("MID_HISTORY", DEFAULT_MID_HISTORY)?,
            window_size: parse_env("WINDOW_SIZE", DEFAULT_WINDOW_SIZE)?,
            snapshot_interval_ns: parse_env("SNAPSHOT_INTERVAL_NS", DEFAULT_SNAPSHOT_INTERVAL_NS)?,
            mid_sample_interval_ns: parse_env(
                "MID_SAMPLE_INTERVAL_NS",
                DEFAULT_MID_SAMPLE_INTERVAL_NS,
            )?,
            front_month_id: parse_env("FRONT_MONTH_ID", DEFAULT_FRONT_MONTH_ID)?,
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("config key {key}: {e}")),
        Err(_) => Ok(default),
    }
}

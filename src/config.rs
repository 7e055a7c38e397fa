use std::path::Path;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use chrono::Duration;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Public RPC endpoint of the Somnia testnet the contract is deployed on.
pub const DEFAULT_RPC_URL: &str = "https://dream-rpc.somnia.network";

/// The contract enforces these two but exposes no getter for them, so they
/// are settings with the documented defaults instead of call-site constants.
/// If the deployed values ever change, the settings have to follow.
pub const DEFAULT_SCAN_WINDOW: u64 = 50;
pub const DEFAULT_EMERGENCY_GRACE_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub rpc_url: String,
    /// Deployed PrizePoolPrediction contract.
    pub contract: Address,
    /// How many of the most recent prediction ids the resolution scan walks.
    pub resolution_scan_window: u64,
    /// Seconds after `resolution_time` until anyone may resolve.
    pub emergency_grace_secs: u64,
    pub receipt_poll_ms: u64,
    pub receipt_timeout_secs: u64,
}

impl Settings {
    /// Reads `funpredict.toml` (or the given file) and the `FUNPREDICT_*`
    /// environment. The contract address is the only required key.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("rpc_url", DEFAULT_RPC_URL)?
            .set_default("resolution_scan_window", DEFAULT_SCAN_WINDOW)?
            .set_default("emergency_grace_secs", DEFAULT_EMERGENCY_GRACE_SECS)?
            .set_default("receipt_poll_ms", 2000u64)?
            .set_default("receipt_timeout_secs", 180u64)?;
        builder = match file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name("funpredict").required(false)),
        };
        builder
            .add_source(Environment::with_prefix("FUNPREDICT"))
            .build()?
            .try_deserialize()
            .context("incomplete configuration, set at least the contract address")
    }

    pub fn emergency_grace(&self) -> Duration {
        Duration::seconds(self.emergency_grace_secs as i64)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        std::env::set_var(
            "FUNPREDICT_CONTRACT",
            "0x1111111111111111111111111111111111111111",
        );
        let settings = Settings::load(Some(Path::new("/nonexistent/funpredict.toml")));
        std::env::remove_var("FUNPREDICT_CONTRACT");
        // A named file that is missing is an error, env alone has to do.
        assert!(settings.is_err());

        std::env::set_var(
            "FUNPREDICT_CONTRACT",
            "0x1111111111111111111111111111111111111111",
        );
        let settings = Settings::load(None).unwrap();
        std::env::remove_var("FUNPREDICT_CONTRACT");
        assert_eq!(settings.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(settings.resolution_scan_window, DEFAULT_SCAN_WINDOW);
        assert_eq!(settings.emergency_grace().num_days(), 7);
    }
}

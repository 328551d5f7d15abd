//! Configuration for the wallet.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use token_core::certificate::TrustAnchor;
use token_core::signing::MintAuthority;

/// Configuration for the wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// JSON-RPC endpoint of the aggregator
    pub aggregator_url: String,
    /// Submission retry policy
    pub retry: RetryPolicy,
    /// Validators whose certificates are accepted
    pub trust_anchor: Option<TrustAnchor>,
    /// Mint authority; every genesis is checked against its keys
    pub minter: Option<MinterConfig>,
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_backoff_ms: u64,
    /// Upper bound for any single delay
    pub max_backoff_ms: u64,
    /// Factor applied to the delay after each failure
    pub multiplier: u32,
    /// Limit for a single aggregator call
    pub call_timeout_ms: u64,
}

/// Mint authority.
#[derive(Clone, Serialize, Deserialize)]
pub struct MinterConfig {
    /// Secret the per-token mint keys are derived from (hex)
    pub secret: String,
}

impl std::fmt::Debug for MinterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MinterConfig { secret: <redacted> }")
    }
}

impl MinterConfig {
    pub fn secret_bytes(&self) -> Result<Vec<u8>> {
        Ok(hex::decode(&self.secret)?)
    }

    /// The authority whose keys sign, and are required on, every genesis.
    pub fn authority(&self) -> Result<MintAuthority> {
        Ok(MintAuthority::new(self.secret_bytes()?)?)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            multiplier: 2,
            call_timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = (self.multiplier.max(1) as u64).saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_backoff_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            aggregator_url: "http://127.0.0.1:3000/rpc".to_string(),
            retry: RetryPolicy::default(),
            trust_anchor: None,
            minter: None,
        }
    }
}

impl WalletConfig {
    /// Loads configuration from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

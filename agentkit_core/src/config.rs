//! Environment-backed settings the host loads before building a context.
//!
//! The dispatcher never reads these; they only feed
//! [`ContextBuilder::from_config`](crate::context::ContextBuilder::from_config).

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use url::Url;

pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
pub const DEFAULT_WALLET_DATA_FILE: &str = "wallet_data.txt";
pub const DEFAULT_HYPERBOLIC_API_URL: &str = "https://api.hyperbolic.xyz/v1";
pub const DEFAULT_TWITTER_API_URL: &str = "https://api.twitter.com/2";
pub const DEFAULT_SSH_KEY_PATH: &str = "~/.ssh/id_rsa";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentkitConfig {
    pub rpc_url: Url,
    pub wallet_data_file: PathBuf,
    pub hyperbolic_api_key: Option<String>,
    pub hyperbolic_api_url: Url,
    pub twitter_access_token: Option<String>,
    pub twitter_api_url: Url,
    pub ssh_private_key_path: String,
}

impl AgentkitConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal in deployed environments.
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let url = |key: &str, default: &str| -> Result<Url> {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            Url::parse(&raw).with_context(|| format!("{key} is not a valid URL: {raw}"))
        };

        Ok(Self {
            rpc_url: url("SOLANA_RPC_URL", DEFAULT_RPC_URL)?,
            wallet_data_file: PathBuf::from(
                get("WALLET_DATA_FILE").unwrap_or_else(|| DEFAULT_WALLET_DATA_FILE.to_string()),
            ),
            hyperbolic_api_key: get("HYPERBOLIC_API_KEY"),
            hyperbolic_api_url: url("HYPERBOLIC_API_URL", DEFAULT_HYPERBOLIC_API_URL)?,
            twitter_access_token: get("TWITTER_ACCESS_TOKEN"),
            twitter_api_url: url("TWITTER_API_URL", DEFAULT_TWITTER_API_URL)?,
            ssh_private_key_path: get("SSH_PRIVATE_KEY_PATH")
                .unwrap_or_else(|| DEFAULT_SSH_KEY_PATH.to_string()),
        })
    }
}

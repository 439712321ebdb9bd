//! Shared, authenticated client state lent to actions one call at a time.

use std::sync::Arc;

use agentkit_compute::{ComputeActions, RemoteShell};
use agentkit_nft::NftActions;
use agentkit_social::SocialActions;
use agentkit_token::TokenActions;
use anyhow::{anyhow, Result};

use crate::config::AgentkitConfig;
use crate::hyperbolic::HyperbolicClient;
use crate::solana::SolanaChain;
use crate::ssh::SshShell;
use crate::twitter::TwitterClient;
use crate::wallet::{load_or_create_keypair, KeypairWallet};

/// Client handles used by actions. Built once through [`ContextBuilder`] and
/// then owned by the dispatcher for the life of the process.
pub struct ExecutionContext {
    token: Option<Arc<dyn TokenActions>>,
    nft: Option<Arc<dyn NftActions>>,
    compute: Option<Arc<dyn ComputeActions>>,
    social: Option<Arc<dyn SocialActions>>,
    shell: Box<dyn RemoteShell>,
    default_ssh_key: String,
}

impl ExecutionContext {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn token(&self) -> Result<&dyn TokenActions> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow!("blockchain backend is not configured"))
    }

    pub fn nft(&self) -> Result<&dyn NftActions> {
        self.nft
            .as_deref()
            .ok_or_else(|| anyhow!("blockchain backend is not configured"))
    }

    pub fn compute(&self) -> Result<&dyn ComputeActions> {
        self.compute
            .as_deref()
            .ok_or_else(|| anyhow!("compute client is not configured (set HYPERBOLIC_API_KEY)"))
    }

    pub fn social(&self) -> Result<&dyn SocialActions> {
        self.social
            .as_deref()
            .ok_or_else(|| anyhow!("social client is not configured (set TWITTER_ACCESS_TOKEN)"))
    }

    pub fn shell(&mut self) -> &mut dyn RemoteShell {
        self.shell.as_mut()
    }

    /// Key used by `ssh_connect` when the caller does not name one.
    pub fn default_ssh_key(&self) -> &str {
        &self.default_ssh_key
    }

    /// Names of the configured capabilities, for start-up logging.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.token.is_some() {
            names.push("token");
        }
        if self.nft.is_some() {
            names.push("nft");
        }
        if self.compute.is_some() {
            names.push("compute");
        }
        if self.social.is_some() {
            names.push("social");
        }
        names.push("shell");
        names
    }
}

/// The unconfigured side of the context: collects clients until `build`.
#[derive(Default)]
pub struct ContextBuilder {
    token: Option<Arc<dyn TokenActions>>,
    nft: Option<Arc<dyn NftActions>>,
    compute: Option<Arc<dyn ComputeActions>>,
    social: Option<Arc<dyn SocialActions>>,
    shell: Option<Box<dyn RemoteShell>>,
    default_ssh_key: Option<String>,
}

impl ContextBuilder {
    /// Builds every client the configuration has credentials for.
    pub fn from_config(config: &AgentkitConfig) -> Result<Self> {
        let keypair = load_or_create_keypair(&config.wallet_data_file)?;
        let wallet = Arc::new(KeypairWallet::new(keypair));
        let chain = Arc::new(SolanaChain::new(wallet, config.rpc_url.as_str()));

        let mut builder = Self::default()
            .chain(chain)
            .ssh_key_path(config.ssh_private_key_path.clone());

        if let Some(api_key) = &config.hyperbolic_api_key {
            builder = builder.compute(Arc::new(HyperbolicClient::new(
                config.hyperbolic_api_url.clone(),
                api_key.clone(),
            )?));
        }

        if let Some(token) = &config.twitter_access_token {
            builder = builder.social(Arc::new(TwitterClient::new(
                config.twitter_api_url.clone(),
                token.clone(),
            )?));
        }

        Ok(builder)
    }

    /// Uses one backend for both token and NFT actions.
    pub fn chain<C>(self, chain: Arc<C>) -> Self
    where
        C: TokenActions + NftActions + 'static,
    {
        let token: Arc<dyn TokenActions> = chain.clone();
        let nft: Arc<dyn NftActions> = chain;
        Self {
            token: Some(token),
            nft: Some(nft),
            ..self
        }
    }

    pub fn token(mut self, token: Arc<dyn TokenActions>) -> Self {
        self.token = Some(token);
        self
    }

    pub fn nft(mut self, nft: Arc<dyn NftActions>) -> Self {
        self.nft = Some(nft);
        self
    }

    pub fn compute(mut self, compute: Arc<dyn ComputeActions>) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn social(mut self, social: Arc<dyn SocialActions>) -> Self {
        self.social = Some(social);
        self
    }

    pub fn shell(mut self, shell: Box<dyn RemoteShell>) -> Self {
        self.shell = Some(shell);
        self
    }

    pub fn ssh_key_path(mut self, path: impl Into<String>) -> Self {
        self.default_ssh_key = Some(path.into());
        self
    }

    pub fn build(self) -> ExecutionContext {
        let context = ExecutionContext {
            token: self.token,
            nft: self.nft,
            compute: self.compute,
            social: self.social,
            shell: self.shell.unwrap_or_else(|| Box::new(SshShell::new())),
            default_ssh_key: self
                .default_ssh_key
                .unwrap_or_else(|| crate::config::DEFAULT_SSH_KEY_PATH.to_string()),
        };
        tracing::info!(capabilities = ?context.capabilities(), "execution context ready");
        context
    }
}

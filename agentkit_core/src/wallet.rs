use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::VersionedTransaction,
};

/// Signer the chain backend hands every outgoing transaction to.
#[async_trait]
pub trait Wallet: Send + Sync + Debug {
    fn pubkey(&self) -> Pubkey;

    async fn sign_transaction(&self, tx: VersionedTransaction) -> Result<VersionedTransaction>;
}

/// Signs with a keypair held in memory, typically loaded by [`load_or_create_keypair`].
#[derive(Debug)]
pub struct KeypairWallet {
    pub keypair: Arc<Keypair>,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(&self, mut tx: VersionedTransaction) -> Result<VersionedTransaction> {
        let signature = self.keypair.sign_message(&tx.message.serialize());
        place_signature(&mut tx, &self.keypair.pubkey(), signature)?;
        Ok(tx)
    }
}

/// Writes `signature` into the slot that belongs to `signer` in the message header.
pub fn place_signature(
    tx: &mut VersionedTransaction,
    signer: &Pubkey,
    signature: Signature,
) -> Result<()> {
    let required = tx.message.header().num_required_signatures as usize;
    let position = tx
        .message
        .static_account_keys()
        .iter()
        .take(required)
        .position(|key| key == signer)
        .ok_or_else(|| anyhow!("{signer} is not a required signer of this transaction"))?;

    if tx.signatures.len() < required {
        tx.signatures.resize(required, Signature::default());
    }
    tx.signatures[position] = signature;
    Ok(())
}

/// Reads the persisted keypair at `path`, or creates and persists a new one.
///
/// The file holds the 64-byte keypair encoded as base58.
pub fn load_or_create_keypair(path: &Path) -> Result<Keypair> {
    if path.exists() {
        let encoded = fs::read_to_string(path)
            .with_context(|| format!("reading wallet data from {}", path.display()))?;
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .with_context(|| format!("wallet data in {} is not base58", path.display()))?;
        return Keypair::from_bytes(&bytes)
            .map_err(|err| anyhow!("wallet data in {} is not a keypair: {err}", path.display()));
    }

    let keypair = Keypair::new();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating wallet directory {}", parent.display()))?;
    }
    fs::write(path, bs58::encode(keypair.to_bytes()).into_string())
        .with_context(|| format!("persisting wallet data to {}", path.display()))?;
    tracing::info!(path = %path.display(), pubkey = %keypair.pubkey(), "created new wallet");
    Ok(keypair)
}

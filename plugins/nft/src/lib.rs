// plugins/nft/src/lib.rs
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// A freshly created collection (or single NFT) and the transaction that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub mint: Pubkey,
    pub metadata: Pubkey,
    pub token_account: Pubkey,
    pub signature: String,
}

#[async_trait]
pub trait NftActions: Send + Sync {
    /// Creates a sized collection NFT owned by the wallet.
    async fn deploy_collection(&self, name: &str, symbol: &str, uri: &str) -> Result<MintReceipt>;

    /// Mints one NFT from `collection` into `destination`'s token account.
    async fn mint_nft(&self, collection: Pubkey, destination: Pubkey) -> Result<MintReceipt>;
}

// plugins/token/src/lib.rs
use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use solana_sdk::pubkey::Pubkey;

/// Native and SPL token operations for the agent's wallet.
#[async_trait]
pub trait TokenActions: Send + Sync {
    /// Address of the wallet that signs and pays.
    fn address(&self) -> Pubkey;

    /// Human-readable name of the cluster the backend talks to.
    fn network(&self) -> String;

    /// Sends `amount` (in UI units) to `to`. `mint` of `None` means native SOL.
    /// Returns the transaction signature.
    async fn transfer(
        &self,
        to: Pubkey,
        amount: BigDecimal,
        mint: Option<Pubkey>,
    ) -> Result<String>;

    /// Balance in UI units; `mint` of `None` means native SOL.
    async fn get_balance(&self, mint: Option<Pubkey>) -> Result<BigDecimal>;

    /// Requests an airdrop of `amount` SOL and waits for confirmation.
    async fn request_airdrop(&self, amount: BigDecimal) -> Result<String>;
}

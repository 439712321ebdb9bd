// plugins/social/src/lib.rs
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Maximum post length accepted by the social API.
pub const MAX_POST_CHARS: usize = 280;

#[async_trait]
pub trait SocialActions: Send + Sync {
    /// Details of the authenticated account.
    async fn account_details(&self) -> Result<Value>;

    /// Recent posts mentioning `account_id`.
    async fn account_mentions(&self, account_id: &str) -> Result<Value>;

    async fn post(&self, text: &str) -> Result<Value>;

    async fn reply(&self, in_reply_to: &str, text: &str) -> Result<Value>;
}

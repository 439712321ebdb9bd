//! Twitter API v2 client authenticated with an OAuth 2.0 user access token.

use agentkit_social::SocialActions;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::http::{build_client, endpoint, send_json};

pub struct TwitterClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl TwitterClient {
    pub fn new(base_url: Url, access_token: String) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url,
            access_token,
        })
    }

    fn get_request(&self, segments: &[&str]) -> Result<reqwest::RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        tracing::debug!(url = %url, "twitter request");
        Ok(self.http.get(url).bearer_auth(&self.access_token))
    }

    fn post_request(&self, segments: &[&str], body: &Value) -> Result<reqwest::RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        tracing::debug!(url = %url, "twitter request");
        Ok(self.http.post(url).bearer_auth(&self.access_token).json(body))
    }
}

#[async_trait]
impl SocialActions for TwitterClient {
    async fn account_details(&self) -> Result<Value> {
        send_json(self.get_request(&["users", "me"])?, "fetching account details").await
    }

    async fn account_mentions(&self, account_id: &str) -> Result<Value> {
        // Account ids are numeric; anything else is a username or garbage.
        if account_id.is_empty() || !account_id.bytes().all(|b| b.is_ascii_digit()) {
            bail!("account_id must be a numeric account id, got '{account_id}'");
        }
        send_json(
            self.get_request(&["users", account_id, "mentions"])?,
            "fetching account mentions",
        )
        .await
    }

    async fn post(&self, text: &str) -> Result<Value> {
        send_json(self.post_request(&["tweets"], &json!({ "text": text }))?, "posting tweet").await
    }

    async fn reply(&self, in_reply_to: &str, text: &str) -> Result<Value> {
        let body = json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": in_reply_to },
        });
        send_json(self.post_request(&["tweets"], &body)?, "posting reply").await
    }
}

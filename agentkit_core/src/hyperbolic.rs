//! Hyperbolic GPU marketplace client.

use agentkit_compute::{ComputeActions, RentRequest};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::http::{build_client, endpoint, send_json};

pub struct HyperbolicClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HyperbolicClient {
    pub fn new(base_url: Url, api_key: String) -> Result<Self> {
        Ok(Self {
            http: build_client()?,
            base_url,
            api_key,
        })
    }

    fn post(&self, segments: &[&str], body: &Value) -> Result<reqwest::RequestBuilder> {
        let url = endpoint(&self.base_url, segments)?;
        tracing::debug!(url = %url, "hyperbolic request");
        Ok(self.http.post(url).bearer_auth(&self.api_key).json(body))
    }
}

#[async_trait]
impl ComputeActions for HyperbolicClient {
    async fn available_gpus(&self) -> Result<Value> {
        send_json(
            self.post(&["marketplace"], &json!({ "filters": {} }))?,
            "listing available GPUs",
        )
        .await
    }

    async fn gpu_status(&self) -> Result<Value> {
        let url = endpoint(&self.base_url, &["marketplace", "instances"])?;
        tracing::debug!(url = %url, "hyperbolic request");
        let request = self.http.get(url).bearer_auth(&self.api_key);
        send_json(request, "fetching GPU status").await
    }

    async fn rent_compute(&self, request: RentRequest) -> Result<Value> {
        let body = serde_json::to_value(&request)?;
        send_json(
            self.post(&["marketplace", "instances", "create"], &body)?,
            "renting compute",
        )
        .await
    }

    async fn terminate_compute(&self, instance_id: &str) -> Result<Value> {
        send_json(
            self.post(
                &["marketplace", "instances", "terminate"],
                &json!({ "id": instance_id }),
            )?,
            "terminating compute",
        )
        .await
    }
}

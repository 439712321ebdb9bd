// plugins/compute/src/lib.rs
use std::fmt;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to rent GPUs on one marketplace node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentRequest {
    pub cluster_name: String,
    pub node_name: String,
    pub gpu_count: u32,
}

/// GPU marketplace operations. Responses are the provider's JSON documents.
#[async_trait]
pub trait ComputeActions: Send + Sync {
    async fn available_gpus(&self) -> Result<Value>;

    async fn gpu_status(&self) -> Result<Value>;

    async fn rent_compute(&self, request: RentRequest) -> Result<Value>;

    async fn terminate_compute(&self, instance_id: &str) -> Result<Value>;
}

/// How a remote shell authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    /// Path to a private key file; `~/` is expanded by the backend.
    Key(String),
    Password(String),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuth::Key(path) => f.debug_tuple("Key").field(path).finish(),
            SshAuth::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Where and how to open a remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub username: String,
    pub port: u16,
    pub auth: SshAuth,
}

impl SshTarget {
    /// Rejects host and user names that a command-line client would read as
    /// options, or that cannot be a single `user@host` destination.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("host", &self.host), ("username", &self.username)] {
            if value.is_empty() {
                bail!("{field} must not be empty");
            }
            if value.starts_with('-') {
                bail!("{field} must not start with '-', got '{value}'");
            }
            if value.chars().any(|c| c.is_whitespace() || c.is_control() || c == '@') {
                bail!("{field} contains characters that are not allowed: '{value}'");
            }
        }
        Ok(())
    }
}

/// A stateful remote shell session. At most one target is connected at a time.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Connects to `target`, replacing any existing session.
    async fn connect(&mut self, target: SshTarget) -> Result<String>;

    /// Runs `command` on the connected host and returns its output. A
    /// non-zero exit status is an error that carries the command's output.
    async fn execute(&mut self, command: &str) -> Result<String>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn connection_info(&self) -> String;
}

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ActionError;
use crate::schema::{ActionArgs, Schema};

/// Documentation-only sample call shown alongside an action.
#[derive(Debug, Clone, Serialize)]
pub struct ActionExample {
    pub input: Value,
    pub output: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionMetadata {
    /// Unique identifier callers dispatch on.
    pub mode: String,
    pub name: String,
    /// Natural-language description of the action and each of its inputs.
    pub prompt: String,
    pub schema: Schema,
    pub examples: Vec<ActionExample>,
}

/// One operation in the catalog.
///
/// `invoke` receives arguments that already passed `metadata().schema`, and
/// borrows the context for the duration of the call only.
#[async_trait]
pub trait Action: Send + Sync {
    fn metadata(&self) -> &ActionMetadata;

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String>;
}

/// Actions keyed by mode, listed in registration order.
#[derive(Default)]
pub struct ActionRegistry {
    actions: Vec<Arc<dyn Action>>,
    index: HashMap<String, usize>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action. A mode that is already present is rejected, never replaced.
    pub fn register<A>(&mut self, action: A) -> Result<(), ActionError>
    where
        A: Action + 'static,
    {
        self.register_arc(Arc::new(action))
    }

    pub fn register_arc(&mut self, action: Arc<dyn Action>) -> Result<(), ActionError> {
        let mode = action.metadata().mode.clone();
        if self.index.contains_key(&mode) {
            return Err(ActionError::DuplicateMode { mode });
        }

        tracing::debug!(mode = %mode, "registered action");
        self.index.insert(mode, self.actions.len());
        self.actions.push(action);
        Ok(())
    }

    pub fn lookup(&self, mode: &str) -> Result<Arc<dyn Action>, ActionError> {
        self.index
            .get(mode)
            .map(|&position| Arc::clone(&self.actions[position]))
            .ok_or_else(|| ActionError::UnknownMode {
                mode: mode.to_string(),
            })
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.index.contains_key(mode)
    }

    /// Registered actions in registration order. Each call starts from the beginning.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Action>> + '_ {
        self.actions.iter()
    }

    pub fn modes(&self) -> impl Iterator<Item = &str> + '_ {
        self.actions.iter().map(|action| action.metadata().mode.as_str())
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

//! Read-only projection of the registry for tool-calling callers.
//!
//! A [`ToolSpec`] carries everything needed to declare a tool and nothing
//! that would let a caller invoke an action without going through the
//! [`Dispatcher`](crate::dispatcher::Dispatcher).

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::actions::ActionRegistry;
use crate::schema::Schema;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolSpec<'a> {
    pub mode: &'a str,
    pub name: &'a str,
    pub prompt: &'a str,
    pub schema: &'a Schema,
}

impl ToolSpec<'_> {
    pub fn input_schema(&self) -> Value {
        self.schema.to_json_schema()
    }

    /// The `{name, description, input_schema}` shape most tool-calling APIs accept.
    pub fn declaration(&self) -> Value {
        json!({
            "name": self.mode,
            "description": self.prompt,
            "input_schema": self.input_schema(),
        })
    }
}

#[derive(Clone)]
pub struct Toolkit {
    registry: Arc<ActionRegistry>,
}

impl Toolkit {
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// One spec per registered action, in registration order.
    pub fn tools(&self) -> impl Iterator<Item = ToolSpec<'_>> + '_ {
        self.registry.iter().map(|action| {
            let meta = action.metadata();
            ToolSpec {
                mode: &meta.mode,
                name: &meta.name,
                prompt: &meta.prompt,
                schema: &meta.schema,
            }
        })
    }

    pub fn tool(&self, mode: &str) -> Option<ToolSpec<'_>> {
        self.tools().find(|tool| tool.mode == mode)
    }

    pub fn declarations(&self) -> Vec<Value> {
        self.tools().map(|tool| tool.declaration()).collect()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

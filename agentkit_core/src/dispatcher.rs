//! Routes `(mode, kwargs)` requests to registered actions.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::actions::ActionRegistry;
use crate::context::ExecutionContext;
use crate::error::{ActionError, ValidationError};
use crate::toolkit::Toolkit;

/// Owns the execution context and lends it to one action at a time.
///
/// The context lock is held for the whole of `run`, so concurrent callers
/// are served strictly one after another.
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    context: Mutex<ExecutionContext>,
}

impl Dispatcher {
    pub fn new(context: ExecutionContext, registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            context: Mutex::new(context),
        }
    }

    pub fn registry(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Read-only view of the catalog for presenting to a caller.
    pub fn toolkit(&self) -> Toolkit {
        Toolkit::new(self.registry())
    }

    /// Validates `kwargs` against `mode`'s schema and invokes it.
    ///
    /// Failures of every kind come back as `Err`; a failing or panicking
    /// action never takes the caller down with it.
    pub async fn run(&self, mode: &str, kwargs: Value) -> Result<String, ActionError> {
        let mut context = self.context.lock().await;

        let action = self.registry.lookup(mode).map_err(|err| {
            tracing::warn!(mode, "dispatch to unknown mode");
            err
        })?;

        let args = action
            .metadata()
            .schema
            .validate(kwargs)
            .map_err(|violations| {
                let err = ValidationError::new(mode, violations);
                tracing::warn!(mode, violations = err.violations.len(), error = %err, "rejected arguments");
                err
            })?;

        tracing::debug!(mode, "invoking action");
        let started = Instant::now();
        let outcome = AssertUnwindSafe(action.invoke(&mut context, args))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let source = match outcome {
            Ok(Ok(output)) => {
                tracing::info!(mode, elapsed_ms, "action succeeded");
                return Ok(output);
            }
            Ok(Err(source)) => source,
            Err(panic) => anyhow!("action panicked: {}", panic_message(panic.as_ref())),
        };

        tracing::error!(mode, elapsed_ms, error = %format!("{source:#}"), "action failed");
        Err(ActionError::Invocation {
            mode: mode.to_string(),
            source,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::actions::{Action, ActionMetadata};
    use crate::schema::{ActionArgs, FieldSpec, FieldType, Schema};

    struct Echo {
        meta: ActionMetadata,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Action for Echo {
        fn metadata(&self) -> &ActionMetadata {
            &self.meta
        }

        async fn invoke(&self, _ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("echo: {}", args.str("text").unwrap_or_default()))
        }
    }

    struct Panics {
        meta: ActionMetadata,
    }

    #[async_trait]
    impl Action for Panics {
        fn metadata(&self) -> &ActionMetadata {
            &self.meta
        }

        async fn invoke(&self, _ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
            panic!("boom");
        }
    }

    fn meta(mode: &str, schema: Schema) -> ActionMetadata {
        ActionMetadata {
            mode: mode.to_string(),
            name: mode.to_string(),
            prompt: format!("{mode} prompt"),
            schema,
            examples: vec![],
        }
    }

    fn dispatcher(calls: Arc<AtomicUsize>) -> Dispatcher {
        let mut registry = ActionRegistry::new();
        registry
            .register(Echo {
                meta: meta(
                    "echo",
                    Schema::new(vec![FieldSpec::required("text", FieldType::String, "Text")]),
                ),
                calls,
            })
            .expect("register echo");
        registry
            .register(Panics {
                meta: meta("panics", Schema::empty()),
            })
            .expect("register panics");
        Dispatcher::new(ExecutionContext::builder().build(), Arc::new(registry))
    }

    #[tokio::test]
    async fn valid_request_reaches_the_action_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Arc::clone(&calls));

        let output = dispatcher
            .run("echo", json!({ "text": "hi" }))
            .await
            .expect("dispatch should succeed");

        assert_eq!(output, "echo: hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_the_action() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Arc::clone(&calls));

        let error = dispatcher
            .run("echo", json!({ "txt": "hi" }))
            .await
            .expect_err("validation should fail");

        match error {
            ActionError::Validation(err) => {
                assert!(err.mentions("text"));
                assert!(err.mentions("txt"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_action_becomes_an_invocation_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(Arc::clone(&calls));

        let error = dispatcher
            .run("panics", Value::Null)
            .await
            .expect_err("panic should be caught");
        assert!(matches!(error, ActionError::Invocation { ref mode, .. } if mode == "panics"));
        assert!(error.to_string().contains("boom"));

        dispatcher
            .run("echo", json!({ "text": "still alive" }))
            .await
            .expect("dispatcher keeps working after a panic");
    }
}

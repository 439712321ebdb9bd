pub mod actions;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod schema;
pub mod toolkit;
pub mod wallet;

pub mod hyperbolic;
mod http;
pub mod solana;
pub mod ssh;
pub mod twitter;

pub mod compute_actions;
pub mod nft_actions;
pub mod social_actions;
pub mod token_actions;

pub use actions::{Action, ActionExample, ActionMetadata, ActionRegistry};
pub use compute_actions::register_compute_actions;
pub use config::AgentkitConfig;
pub use context::{ContextBuilder, ExecutionContext};
pub use dispatcher::Dispatcher;
pub use error::{ActionError, ValidationError, Violation};
pub use nft_actions::register_nft_actions;
pub use schema::{ActionArgs, FieldSpec, FieldType, Schema};
pub use social_actions::register_social_actions;
pub use token_actions::register_token_actions;
pub use toolkit::{ToolSpec, Toolkit};

/// Registers the full catalog: blockchain, compute, then social actions.
pub fn register_all_actions(registry: &mut ActionRegistry) -> Result<(), ActionError> {
    register_token_actions(registry)?;
    register_nft_actions(registry)?;
    register_compute_actions(registry)?;
    register_social_actions(registry)?;
    Ok(())
}

use agentkit_social::MAX_POST_CHARS;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::actions::{Action, ActionExample, ActionMetadata, ActionRegistry};
use crate::context::ExecutionContext;
use crate::error::ActionError;
use crate::schema::{ActionArgs, FieldSpec, FieldType, Schema};

fn check_length(field: &str, text: &str) -> Result<()> {
    let length = text.chars().count();
    if length > MAX_POST_CHARS {
        bail!("{field} is {length} characters long; the limit is {MAX_POST_CHARS}");
    }
    Ok(())
}

// =============================================================================
// account_details - Authenticated account
// =============================================================================

#[derive(Debug)]
pub struct AccountDetailsAction {
    meta: ActionMetadata,
}

impl AccountDetailsAction {
    pub fn new() -> Self {
        let meta = ActionMetadata {
            mode: "account_details".to_string(),
            name: "Account details".to_string(),
            prompt: "This tool returns the id, name and username of the agent's own social \
                     account. It takes no inputs."
                .to_string(),
            schema: Schema::empty(),
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for AccountDetailsAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
        let details = ctx.social()?.account_details().await?;
        Ok(format!("Successfully retrieved account details:\n{details}"))
    }
}

// =============================================================================
// account_mentions - Recent mentions of an account
// =============================================================================

#[derive(Debug)]
pub struct AccountMentionsAction {
    meta: ActionMetadata,
}

impl AccountMentionsAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::required(
            "account_id",
            FieldType::String,
            "Numeric id of the account, e.g. from account_details",
        )
        .example("1234567890")]);

        let meta = ActionMetadata {
            mode: "account_mentions".to_string(),
            name: "Account mentions".to_string(),
            prompt: "This tool returns recent posts that mention an account. Input:\n\
                     - account_id: the numeric account id, not the @username"
                .to_string(),
            schema,
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for AccountMentionsAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            account_id: String,
        }

        let parsed: Input = args.parse()?;
        let mentions = ctx.social()?.account_mentions(&parsed.account_id).await?;
        Ok(format!("Successfully retrieved account mentions:\n{mentions}"))
    }
}

// =============================================================================
// post_tweet - Publish a post
// =============================================================================

#[derive(Debug)]
pub struct PostTweetAction {
    meta: ActionMetadata,
}

impl PostTweetAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::required(
            "tweet",
            FieldType::String,
            "Text to post, at most 280 characters",
        )]);

        let examples = vec![ActionExample {
            input: json!({ "tweet": "gm from the agent" }),
            output: "Successfully posted to Twitter:\n{\"data\":{\"id\":\"1\"}}".to_string(),
            explanation: "Publish a short post".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "post_tweet".to_string(),
            name: "Post tweet".to_string(),
            prompt: "This tool publishes a post from the agent's account. Input:\n\
                     - tweet: the text to post, at most 280 characters"
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for PostTweetAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            tweet: String,
        }

        let parsed: Input = args.parse()?;
        check_length("tweet", &parsed.tweet)?;
        let response = ctx.social()?.post(&parsed.tweet).await?;
        Ok(format!("Successfully posted to Twitter:\n{response}"))
    }
}

// =============================================================================
// post_tweet_reply - Reply to a post
// =============================================================================

#[derive(Debug)]
pub struct PostTweetReplyAction {
    meta: ActionMetadata,
}

impl PostTweetReplyAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required("tweet_id", FieldType::String, "Id of the post to reply to"),
            FieldSpec::required(
                "tweet_reply",
                FieldType::String,
                "Reply text, at most 280 characters",
            ),
        ]);

        let meta = ActionMetadata {
            mode: "post_tweet_reply".to_string(),
            name: "Post tweet reply".to_string(),
            prompt: "This tool replies to an existing post from the agent's account. Inputs:\n\
                     - tweet_id: id of the post being answered\n\
                     - tweet_reply: the reply text, at most 280 characters"
                .to_string(),
            schema,
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for PostTweetReplyAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            tweet_id: String,
            tweet_reply: String,
        }

        let parsed: Input = args.parse()?;
        check_length("tweet_reply", &parsed.tweet_reply)?;
        let response = ctx
            .social()?
            .reply(&parsed.tweet_id, &parsed.tweet_reply)
            .await?;
        Ok(format!("Successfully posted reply to Twitter:\n{response}"))
    }
}

// =============================================================================
// Register social actions
// =============================================================================

pub fn register_social_actions(registry: &mut ActionRegistry) -> Result<(), ActionError> {
    registry.register(AccountDetailsAction::new())?;
    registry.register(AccountMentionsAction::new())?;
    registry.register(PostTweetAction::new())?;
    registry.register(PostTweetReplyAction::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_limit_counts_characters_not_bytes() {
        let accented = "é".repeat(MAX_POST_CHARS);
        assert!(check_length("tweet", &accented).is_ok());

        let too_long = "a".repeat(MAX_POST_CHARS + 1);
        let error = check_length("tweet", &too_long).expect_err("over the limit");
        assert!(error.to_string().contains("281"));
    }
}

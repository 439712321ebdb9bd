use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentkit_compute::{RemoteShell, SshAuth, SshTarget};
use agentkit_core::{
    register_all_actions, Action, ActionArgs, ActionError, ActionMetadata, ActionRegistry,
    Dispatcher, ExecutionContext, Schema,
};
use agentkit_nft::{MintReceipt, NftActions};
use agentkit_social::SocialActions;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

struct FakeNft {
    mint: Pubkey,
    mints: Mutex<Vec<(Pubkey, Pubkey)>>,
}

impl FakeNft {
    fn new() -> Self {
        Self {
            mint: Pubkey::new_unique(),
            mints: Mutex::default(),
        }
    }
}

#[async_trait]
impl NftActions for FakeNft {
    async fn deploy_collection(&self, _name: &str, _symbol: &str, _uri: &str) -> Result<MintReceipt> {
        bail!("deploy is not used in these tests")
    }

    async fn mint_nft(&self, collection: Pubkey, destination: Pubkey) -> Result<MintReceipt> {
        self.mints
            .lock()
            .expect("mints lock")
            .push((collection, destination));
        Ok(MintReceipt {
            mint: self.mint,
            metadata: Pubkey::new_unique(),
            token_account: Pubkey::new_unique(),
            signature: "fake-signature".to_string(),
        })
    }
}

#[derive(Default)]
struct RateLimitedSocial {
    posts: Mutex<usize>,
}

#[async_trait]
impl SocialActions for RateLimitedSocial {
    async fn account_details(&self) -> Result<Value> {
        Ok(json!({ "data": { "id": "42", "username": "agent" } }))
    }

    async fn account_mentions(&self, _account_id: &str) -> Result<Value> {
        Ok(json!({ "data": [] }))
    }

    async fn post(&self, _text: &str) -> Result<Value> {
        *self.posts.lock().expect("posts lock") += 1;
        bail!("rate limit exceeded")
    }

    async fn reply(&self, _in_reply_to: &str, _text: &str) -> Result<Value> {
        bail!("rate limit exceeded")
    }
}

/// Records commands and answers with a fixed output. Commands containing
/// `fail_on` exit non-zero.
#[derive(Default)]
struct ScriptedShell {
    target: Option<SshTarget>,
    commands: Arc<Mutex<Vec<String>>>,
    auths: Arc<Mutex<Vec<SshAuth>>>,
    fail_on: Option<&'static str>,
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn connect(&mut self, target: SshTarget) -> Result<String> {
        let message = format!("Successfully connected to {} as {}", target.host, target.username);
        self.auths.lock().expect("auths lock").push(target.auth.clone());
        self.target = Some(target);
        Ok(message)
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        if self.target.is_none() {
            bail!("no active SSH connection");
        }
        self.commands
            .lock()
            .expect("commands lock")
            .push(command.to_string());
        match self.fail_on {
            Some(marker) if command.contains(marker) => {
                bail!("remote command exited with status 100\nE: Unable to locate package")
            }
            _ => Ok("ok".to_string()),
        }
    }

    fn disconnect(&mut self) {
        self.target = None;
    }

    fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    fn connection_info(&self) -> String {
        match &self.target {
            Some(target) => format!("Connected to {}@{}:{}", target.username, target.host, target.port),
            None => "No active SSH connection".to_string(),
        }
    }
}

/// Tracks how many invocations overlap and the highest overlap seen.
struct Overlap {
    meta: ActionMetadata,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Action for Overlap {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, _ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("done".to_string())
    }
}

struct Harness {
    dispatcher: Dispatcher,
    nft: Arc<FakeNft>,
    social: Arc<RateLimitedSocial>,
    commands: Arc<Mutex<Vec<String>>>,
    auths: Arc<Mutex<Vec<SshAuth>>>,
    peak: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    harness_with_failing_command(None)
}

fn harness_with_failing_command(fail_on: Option<&'static str>) -> Harness {
    let nft = Arc::new(FakeNft::new());
    let social = Arc::new(RateLimitedSocial::default());
    let commands = Arc::new(Mutex::new(Vec::new()));
    let auths = Arc::new(Mutex::new(Vec::new()));
    let peak = Arc::new(AtomicUsize::new(0));

    let context = ExecutionContext::builder()
        .nft(nft.clone())
        .social(social.clone())
        .shell(Box::new(ScriptedShell {
            target: None,
            commands: Arc::clone(&commands),
            auths: Arc::clone(&auths),
            fail_on,
        }))
        .ssh_key_path("/keys/agent")
        .build();

    let mut registry = ActionRegistry::new();
    register_all_actions(&mut registry).expect("catalog registers cleanly");
    registry
        .register(Overlap {
            meta: ActionMetadata {
                mode: "overlap".to_string(),
                name: "Overlap".to_string(),
                prompt: "Counts overlapping invocations.".to_string(),
                schema: Schema::empty(),
                examples: vec![],
            },
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        })
        .expect("register overlap");

    Harness {
        dispatcher: Dispatcher::new(context, Arc::new(registry)),
        nft,
        social,
        commands,
        auths,
        peak,
    }
}

#[tokio::test]
async fn mint_reaches_the_backend_once_with_the_given_addresses() {
    let harness = harness();
    let collection = Pubkey::new_unique();
    let destination = Pubkey::new_unique();

    let output = harness
        .dispatcher
        .run(
            "mint_nft",
            json!({
                "contract_address": collection.to_string(),
                "destination": destination.to_string(),
            }),
        )
        .await
        .expect("mint should succeed");

    let mints = harness.nft.mints.lock().expect("mints lock").clone();
    assert_eq!(mints, vec![(collection, destination)]);
    assert_eq!(
        output,
        format!(
            "Minted NFT from collection {collection} to address {destination}\n\
             Mint: {}\nTransaction signature: fake-signature",
            harness.nft.mint
        )
    );
}

#[tokio::test]
async fn missing_field_is_reported_without_invoking() {
    let harness = harness();

    let error = harness
        .dispatcher
        .run(
            "mint_nft",
            json!({ "contract_address": Pubkey::new_unique().to_string() }),
        )
        .await
        .expect_err("destination is required");

    match &error {
        ActionError::Validation(err) => {
            assert_eq!(err.mode, "mint_nft");
            assert_eq!(err.missing_fields(), vec!["destination"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(error.is_user_error());
    assert!(harness.nft.mints.lock().expect("mints lock").is_empty());
}

#[tokio::test]
async fn backend_failure_is_wrapped_and_the_dispatcher_stays_usable() {
    let harness = harness();

    let error = harness
        .dispatcher
        .run("post_tweet", json!({ "tweet": "hello" }))
        .await
        .expect_err("rate limited");

    assert!(matches!(&error, ActionError::Invocation { mode, .. } if mode == "post_tweet"));
    assert!(error.to_string().contains("rate limit exceeded"));
    assert!(!error.is_user_error());
    assert_eq!(*harness.social.posts.lock().expect("posts lock"), 1);

    harness
        .dispatcher
        .run(
            "mint_nft",
            json!({
                "contract_address": Pubkey::new_unique().to_string(),
                "destination": Pubkey::new_unique().to_string(),
            }),
        )
        .await
        .expect("next dispatch succeeds");
}

#[tokio::test]
async fn unknown_mode_leaves_the_registry_untouched() {
    let harness = harness();
    let before: Vec<String> = harness.dispatcher.registry().modes().map(String::from).collect();

    let error = harness
        .dispatcher
        .run("do_nothing", json!({}))
        .await
        .expect_err("not registered");

    assert!(matches!(&error, ActionError::UnknownMode { mode } if mode == "do_nothing"));
    let after: Vec<String> = harness.dispatcher.registry().modes().map(String::from).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn unknown_keys_are_rejected_alongside_missing_ones() {
    let harness = harness();

    let error = harness
        .dispatcher
        .run("post_tweet_reply", json!({ "tweet_id": "1", "text": "hi", "extra": true }))
        .await
        .expect_err("closed schema");

    let ActionError::Validation(err) = error else {
        panic!("expected a validation error");
    };
    assert_eq!(err.missing_fields(), vec!["tweet_reply"]);
    assert!(err.mentions("extra"));
    assert!(err.mentions("text"));
}

#[tokio::test]
async fn empty_inputs_are_accepted_for_argumentless_actions() {
    let harness = harness();

    for kwargs in [Value::Null, json!(""), json!("{}"), json!({})] {
        let output = harness
            .dispatcher
            .run("account_details", kwargs)
            .await
            .expect("no arguments needed");
        assert!(output.contains("agent"));
    }
}

#[tokio::test]
async fn unconfigured_backend_fails_at_invocation() {
    let harness = harness();

    let error = harness
        .dispatcher
        .run("get_available_gpus", json!({}))
        .await
        .expect_err("compute client is missing");

    assert!(matches!(error, ActionError::Invocation { .. }));
    assert!(error.to_string().contains("HYPERBOLIC_API_KEY"));
}

#[tokio::test]
async fn shell_session_persists_between_dispatches() {
    let harness = harness();

    let status = harness
        .dispatcher
        .run("remote_shell", json!({ "command": "ssh_status" }))
        .await
        .expect("status works without a session");
    assert_eq!(status, "No active SSH connection");

    harness
        .dispatcher
        .run("ssh_connect", json!({ "host": "203.0.113.7", "username": "ubuntu", "port": "2222" }))
        .await
        .expect("connect succeeds");

    let status = harness
        .dispatcher
        .run("remote_shell", json!({ "command": "ssh_status" }))
        .await
        .expect("status");
    assert_eq!(status, "Connected to ubuntu@203.0.113.7:2222");

    let output = harness
        .dispatcher
        .run("remote_shell", json!({ "command": "nvidia-smi" }))
        .await
        .expect("command runs");
    assert_eq!(output, "ok");
    assert_eq!(
        *harness.commands.lock().expect("commands lock"),
        vec!["nvidia-smi".to_string()]
    );
}

#[tokio::test]
async fn snap_node_requires_a_connection_and_validates_network() {
    let harness = harness();

    let error = harness
        .dispatcher
        .run("spin_up_snap_node", json!({ "network": "ropsten" }))
        .await
        .expect_err("unsupported network");
    assert!(matches!(error, ActionError::Validation(_)));

    let error = harness
        .dispatcher
        .run("spin_up_snap_node", json!({}))
        .await
        .expect_err("not connected");
    assert!(error.to_string().contains("ssh_connect"));

    harness
        .dispatcher
        .run("ssh_connect", json!({ "host": "node", "username": "root" }))
        .await
        .expect("connect");
    let report = harness
        .dispatcher
        .run("spin_up_snap_node", json!({}))
        .await
        .expect("setup runs");

    assert!(report.ends_with("Snap node for mainnet is running."));
    assert!(harness
        .commands
        .lock()
        .expect("commands lock")
        .iter()
        .any(|command| command.contains("geth --mainnet")));
}

#[tokio::test]
async fn duplicate_catalog_registration_is_rejected() {
    let mut registry = ActionRegistry::new();
    register_all_actions(&mut registry).expect("first registration");
    let count = registry.len();

    let error = register_all_actions(&mut registry).expect_err("modes already present");
    assert!(matches!(error, ActionError::DuplicateMode { ref mode } if mode == "get_wallet_details"));
    assert_eq!(registry.len(), count);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_dispatches_never_overlap() {
    let harness = Arc::new(harness());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let harness = Arc::clone(&harness);
        handles.push(tokio::spawn(async move {
            harness.dispatcher.run("overlap", json!({})).await
        }));
    }

    for handle in handles {
        let output = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("dispatch finishes")
            .expect("task joins")
            .expect("overlap succeeds");
        assert_eq!(output, "done");
    }
    assert_eq!(harness.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failing_snap_node_step_stops_the_setup() {
    let harness = harness_with_failing_command(Some("ppa:ethereum"));
    harness
        .dispatcher
        .run("ssh_connect", json!({ "host": "node", "username": "root" }))
        .await
        .expect("connect");

    let error = harness
        .dispatcher
        .run("spin_up_snap_node", json!({ "network": "sepolia" }))
        .await
        .expect_err("install step fails");

    let message = error.to_string();
    assert!(message.contains("[ok] update system and install utilities"));
    assert!(message.contains("[failed] install Geth and Lighthouse"));
    assert!(message.contains("exited with status 100"));
    assert!(!message.contains("is running"));

    let commands = harness.commands.lock().expect("commands lock").clone();
    assert!(commands.last().is_some_and(|last| last.contains("ppa:ethereum")));
    assert!(!commands.iter().any(|command| command.contains("geth --sepolia")));
}

#[tokio::test]
async fn option_like_ssh_names_never_reach_the_shell() {
    let harness = harness();

    for kwargs in [
        json!({ "host": "h", "username": "-oProxyCommand=touch /tmp/owned" }),
        json!({ "host": "-oProxyCommand=id", "username": "root" }),
    ] {
        let error = harness
            .dispatcher
            .run("ssh_connect", kwargs)
            .await
            .expect_err("rejected");
        assert!(matches!(error, ActionError::Invocation { .. }));
        assert!(error.to_string().contains("must not start with '-'"));
    }

    assert!(harness.auths.lock().expect("auths lock").is_empty());
    let status = harness
        .dispatcher
        .run("remote_shell", json!({ "command": "ssh_status" }))
        .await
        .expect("status");
    assert_eq!(status, "No active SSH connection");
}

#[tokio::test]
async fn ssh_connect_chooses_password_or_key_auth() {
    let harness = harness();

    harness
        .dispatcher
        .run("ssh_connect", json!({ "host": "node", "username": "root", "password": "s3cret" }))
        .await
        .expect("password connect");
    harness
        .dispatcher
        .run("ssh_connect", json!({ "host": "node", "username": "root" }))
        .await
        .expect("default key connect");
    harness
        .dispatcher
        .run(
            "ssh_connect",
            json!({ "host": "node", "username": "root", "private_key_path": "/keys/other" }),
        )
        .await
        .expect("explicit key connect");

    assert_eq!(
        *harness.auths.lock().expect("auths lock"),
        vec![
            SshAuth::Password("s3cret".to_string()),
            SshAuth::Key("/keys/agent".to_string()),
            SshAuth::Key("/keys/other".to_string()),
        ]
    );
}

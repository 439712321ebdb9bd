//! GPU marketplace and remote-shell actions.

use agentkit_compute::{RentRequest, SshAuth, SshTarget};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::actions::{Action, ActionExample, ActionMetadata, ActionRegistry};
use crate::context::ExecutionContext;
use crate::error::ActionError;
use crate::schema::{ActionArgs, FieldSpec, FieldType, Schema};

/// `remote_shell` input that reports the connection instead of running anything.
const SSH_STATUS_COMMAND: &str = "ssh_status";

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

// =============================================================================
// get_available_gpus
// =============================================================================

#[derive(Debug)]
pub struct GetAvailableGpusAction {
    meta: ActionMetadata,
}

impl GetAvailableGpusAction {
    pub fn new() -> Self {
        let meta = ActionMetadata {
            mode: "get_available_gpus".to_string(),
            name: "Get available GPUs".to_string(),
            prompt: "This tool lists every GPU currently offered on the Hyperbolic marketplace, \
                     grouped by cluster and node. It takes no inputs. Prices are in USD cents \
                     per GPU-hour. Use the cluster and node names it returns with rent_compute."
                .to_string(),
            schema: Schema::empty(),
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for GetAvailableGpusAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
        pretty(&ctx.compute()?.available_gpus().await?)
    }
}

// =============================================================================
// get_gpu_status
// =============================================================================

#[derive(Debug)]
pub struct GetGpuStatusAction {
    meta: ActionMetadata,
}

impl GetGpuStatusAction {
    pub fn new() -> Self {
        let meta = ActionMetadata {
            mode: "get_gpu_status".to_string(),
            name: "Get GPU status".to_string(),
            prompt: "This tool returns the status of the GPU instances the agent currently rents, \
                     including the SSH command for each running instance. It takes no inputs."
                .to_string(),
            schema: Schema::empty(),
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for GetGpuStatusAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
        pretty(&ctx.compute()?.gpu_status().await?)
    }
}

// =============================================================================
// rent_compute
// =============================================================================

#[derive(Debug)]
pub struct RentComputeAction {
    meta: ActionMetadata,
}

impl RentComputeAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required("cluster_name", FieldType::String, "Cluster the node belongs to")
                .example("extrasmall-chamomile-duck"),
            FieldSpec::required("node_name", FieldType::String, "Node to rent GPUs on")
                .example("las1-prd-acl-msi-09.fen.intra"),
            FieldSpec::required("gpu_count", FieldType::Integer, "Number of GPUs to rent")
                .example("1"),
        ]);

        let examples = vec![ActionExample {
            input: json!({
                "cluster_name": "extrasmall-chamomile-duck",
                "node_name": "las1-prd-acl-msi-09.fen.intra",
                "gpu_count": 1,
            }),
            output: "{\n  \"status\": \"success\"\n}".to_string(),
            explanation: "Rent one GPU on a listed node".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "rent_compute".to_string(),
            name: "Rent compute".to_string(),
            prompt: "This tool rents GPUs on the Hyperbolic marketplace. Inputs:\n\
                     - cluster_name: the cluster the node is on\n\
                     - node_name: the node to rent from\n\
                     - gpu_count: how many GPUs to rent (at least 1)\n\
                     Take all three from get_available_gpus; the rental fails if any of them \
                     is not recognized."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for RentComputeAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            cluster_name: String,
            node_name: String,
            gpu_count: i64,
        }

        let parsed: Input = args.parse()?;
        if parsed.cluster_name.trim().is_empty() || parsed.node_name.trim().is_empty() {
            bail!("cluster_name and node_name must not be empty");
        }
        let gpu_count = match u32::try_from(parsed.gpu_count) {
            Ok(count) if count > 0 => count,
            _ => bail!("gpu_count must be at least 1, got {}", parsed.gpu_count),
        };

        let response = ctx
            .compute()?
            .rent_compute(RentRequest {
                cluster_name: parsed.cluster_name,
                node_name: parsed.node_name,
                gpu_count,
            })
            .await?;
        pretty(&response)
    }
}

// =============================================================================
// terminate_compute
// =============================================================================

#[derive(Debug)]
pub struct TerminateComputeAction {
    meta: ActionMetadata,
}

impl TerminateComputeAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::required(
            "instance_id",
            FieldType::String,
            "Id of the rented instance, as shown by get_gpu_status",
        )]);

        let meta = ActionMetadata {
            mode: "terminate_compute".to_string(),
            name: "Terminate compute".to_string(),
            prompt: "This tool ends a GPU rental on the Hyperbolic marketplace. Input:\n\
                     - instance_id: the id of a running instance from get_gpu_status\n\
                     Billing for the instance stops once it is terminated."
                .to_string(),
            schema,
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for TerminateComputeAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            instance_id: String,
        }

        let parsed: Input = args.parse()?;
        pretty(&ctx.compute()?.terminate_compute(&parsed.instance_id).await?)
    }
}

// =============================================================================
// ssh_connect
// =============================================================================

#[derive(Debug)]
pub struct SshConnectAction {
    meta: ActionMetadata,
}

impl SshConnectAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required("host", FieldType::String, "Hostname or IP address of the server"),
            FieldSpec::required("username", FieldType::String, "User to log in as"),
            FieldSpec::optional(
                "private_key_path",
                FieldType::String,
                "Path to the private key; defaults to SSH_PRIVATE_KEY_PATH",
            ),
            FieldSpec::optional(
                "password",
                FieldType::String,
                "Password to log in with instead of a key",
            ),
            FieldSpec::with_default("port", FieldType::Integer, "SSH port", 22),
        ]);

        let examples = vec![ActionExample {
            input: json!({ "host": "203.0.113.7", "username": "ubuntu", "port": 31245 }),
            output: "Successfully connected to 203.0.113.7 as ubuntu".to_string(),
            explanation: "Connect to a freshly rented GPU instance".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "ssh_connect".to_string(),
            name: "SSH connect".to_string(),
            prompt: "This tool opens an SSH session to a remote server. Afterwards every \
                     remote_shell command runs on that server. Inputs:\n\
                     - host: hostname or IP address of the server\n\
                     - username: the user to log in as\n\
                     - private_key_path (optional): key file to authenticate with; the \
                     configured default key is used when omitted\n\
                     - password (optional): log in with this password instead of a key\n\
                     - port (optional, default 22): SSH port\n\
                     Connecting again replaces the current session."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for SshConnectAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            host: String,
            username: String,
            private_key_path: Option<String>,
            password: Option<String>,
            port: i64,
        }

        let parsed: Input = args.parse()?;
        let port = match u16::try_from(parsed.port) {
            Ok(port) if port > 0 => port,
            _ => bail!("port must be between 1 and 65535, got {}", parsed.port),
        };
        let auth = match (parsed.password, parsed.private_key_path) {
            (Some(password), _) => SshAuth::Password(password),
            (None, Some(path)) => SshAuth::Key(path),
            (None, None) => SshAuth::Key(ctx.default_ssh_key().to_string()),
        };
        let target = SshTarget {
            host: parsed.host,
            username: parsed.username,
            port,
            auth,
        };
        target.validate()?;

        ctx.shell().connect(target).await
    }
}

// =============================================================================
// remote_shell
// =============================================================================

#[derive(Debug)]
pub struct RemoteShellAction {
    meta: ActionMetadata,
}

impl RemoteShellAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::required(
            "command",
            FieldType::String,
            "Shell command to run on the connected server",
        )
        .example("nvidia-smi")]);

        let meta = ActionMetadata {
            mode: "remote_shell".to_string(),
            name: "Remote shell".to_string(),
            prompt: "This tool runs a shell command on the server connected with ssh_connect \
                     and returns its output. Input:\n\
                     - command: the command to run. The special command 'ssh_status' reports \
                     the current connection instead.\n\
                     Output written to stderr is returned alongside stdout. A command that \
                     exits with a non-zero status fails, and the error carries its output."
                .to_string(),
            schema,
            examples: vec![],
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for RemoteShellAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            command: String,
        }

        let parsed: Input = args.parse()?;
        if parsed.command.trim().eq_ignore_ascii_case(SSH_STATUS_COMMAND) {
            return Ok(ctx.shell().connection_info());
        }
        ctx.shell().execute(&parsed.command).await
    }
}

// =============================================================================
// spin_up_snap_node
// =============================================================================

#[derive(Debug)]
pub struct SpinUpSnapNodeAction {
    meta: ActionMetadata,
}

impl SpinUpSnapNodeAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::with_default(
            "network",
            FieldType::one_of(["mainnet", "sepolia", "holesky"]),
            "Ethereum network to sync",
            "mainnet",
        )]);

        let meta = ActionMetadata {
            mode: "spin_up_snap_node".to_string(),
            name: "Spin up snap node".to_string(),
            prompt: "This tool installs and starts an Ethereum snap-sync node (Geth plus \
                     Lighthouse) on the server connected with ssh_connect. Rent a GPU machine \
                     and connect to it first. Input:\n\
                     - network (optional, default mainnet): one of mainnet, sepolia, holesky\n\
                     The result reports each step; it stops at the first step that fails."
                .to_string(),
            schema,
            examples: vec![],
        };

        Self { meta }
    }
}

/// Ordered setup steps as `(description, commands)`.
fn snap_node_steps(network: &str) -> Vec<(&'static str, Vec<String>)> {
    const LIGHTHOUSE_RELEASE: &str = "https://github.com/sigp/lighthouse/releases/download/v4.0.1/lighthouse-v4.0.1-x86_64-unknown-linux-gnu.tar.gz";
    let jwt = "./.secrets/jwt.hex";
    let data_dir = "./.ethereum";

    vec![
        (
            "update system and install utilities",
            vec![
                "sudo apt-get update && sudo apt-get upgrade -y".to_string(),
                "sudo apt-get install -y curl wget openssl software-properties-common".to_string(),
            ],
        ),
        (
            "install Geth and Lighthouse",
            vec![
                "sudo add-apt-repository -y ppa:ethereum/ethereum".to_string(),
                "sudo apt-get update && sudo apt-get install -y ethereum".to_string(),
                format!("curl -sSLo lighthouse.tar.gz {LIGHTHOUSE_RELEASE}"),
                "tar -xzf lighthouse.tar.gz && sudo cp lighthouse /usr/bin".to_string(),
            ],
        ),
        (
            "generate JWT secret",
            vec![
                "mkdir -p ./.secrets".to_string(),
                format!("openssl rand -hex 32 | tr -d '\\n' > {jwt}"),
            ],
        ),
        (
            "start Geth",
            vec![
                format!("mkdir -p {data_dir}"),
                format!(
                    "nohup geth --{network} --syncmode snap --datadir {data_dir} --http \
                     --authrpc.addr localhost --authrpc.vhosts localhost --authrpc.port 8551 \
                     --authrpc.jwtsecret {jwt} > {data_dir}/geth.log 2>&1 &"
                ),
            ],
        ),
        (
            "start Lighthouse",
            vec![format!(
                "nohup lighthouse beacon_node --network {network} --http \
                 --execution-endpoint http://localhost:8551 --datadir {data_dir} \
                 --execution-jwt {jwt} > {data_dir}/lighthouse.log 2>&1 &"
            )],
        ),
        (
            "check Geth",
            vec![
                "sleep 5; curl -s -X POST -H 'Content-Type: application/json' \
                 --data '{\"jsonrpc\":\"2.0\",\"method\":\"web3_clientVersion\",\"params\":[],\"id\":1}' \
                 http://localhost:8545"
                    .to_string(),
            ],
        ),
        (
            "check Lighthouse",
            vec!["curl -s -X GET http://localhost:5052/eth/v1/node/health -w '%{http_code}'".to_string()],
        ),
    ]
}

#[async_trait]
impl Action for SpinUpSnapNodeAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        let network = args.str("network").unwrap_or("mainnet").to_string();
        let shell = ctx.shell();
        if !shell.is_connected() {
            bail!("no active SSH connection; rent a GPU and run ssh_connect first");
        }

        let mut report = Vec::new();
        for (step, commands) in snap_node_steps(&network) {
            let mut last_output = String::new();
            for command in &commands {
                match shell.execute(command).await {
                    Ok(output) => last_output = output,
                    Err(err) => {
                        tracing::warn!(step, command = %command, "snap node step failed");
                        report.push(format!("[failed] {step}: {err:#}"));
                        bail!("{}", report.join("\n"));
                    }
                }
            }
            tracing::debug!(step, "snap node step finished");
            if step.starts_with("check") {
                report.push(format!("[ok] {step}: {}", last_output.trim()));
            } else {
                report.push(format!("[ok] {step}"));
            }
        }

        report.push(format!("Snap node for {network} is running."));
        Ok(report.join("\n"))
    }
}

// =============================================================================
// Register compute actions
// =============================================================================

pub fn register_compute_actions(registry: &mut ActionRegistry) -> Result<(), ActionError> {
    registry.register(GetAvailableGpusAction::new())?;
    registry.register(GetGpuStatusAction::new())?;
    registry.register(RentComputeAction::new())?;
    registry.register(TerminateComputeAction::new())?;
    registry.register(SshConnectAction::new())?;
    registry.register(RemoteShellAction::new())?;
    registry.register(SpinUpSnapNodeAction::new())?;
    Ok(())
}

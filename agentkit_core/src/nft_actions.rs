use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::actions::{Action, ActionExample, ActionMetadata, ActionRegistry};
use crate::context::ExecutionContext;
use crate::error::ActionError;
use crate::schema::{ActionArgs, FieldSpec, FieldType, Schema};
use crate::token_actions::parse_address;

// =============================================================================
// deploy_nft - Create an NFT collection
// =============================================================================

#[derive(Debug)]
pub struct DeployNftAction {
    meta: ActionMetadata,
}

impl DeployNftAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required("name", FieldType::String, "Name of the collection")
                .example("Example NFT"),
            FieldSpec::required("symbol", FieldType::String, "Short ticker symbol").example("EXNFT"),
            FieldSpec::required(
                "base_uri",
                FieldType::String,
                "URI of the collection's off-chain JSON metadata",
            )
            .example("https://example.com/collection.json"),
        ]);

        let examples = vec![ActionExample {
            input: json!({
                "name": "My Collection",
                "symbol": "MCOL",
                "base_uri": "https://arweave.net/metadata.json",
            }),
            output: "Deployed NFT collection My Collection to address 7nE9Gvc...\n\
                     Transaction signature: 5xY2Abc..."
                .to_string(),
            explanation: "Create a new collection owned by the agent".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "deploy_nft".to_string(),
            name: "Deploy NFT collection".to_string(),
            prompt: "This tool deploys a new NFT collection owned by the agent's wallet. Inputs:\n\
                     - name: the collection name, e.g. 'Example NFT'\n\
                     - symbol: a short symbol, e.g. 'EXNFT'\n\
                     - base_uri: URI of the collection's JSON metadata\n\
                     The returned address is what mint_nft expects as contract_address."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for DeployNftAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            name: String,
            symbol: String,
            base_uri: String,
        }

        let parsed: Input = args.parse()?;
        let receipt = ctx
            .nft()?
            .deploy_collection(&parsed.name, &parsed.symbol, &parsed.base_uri)
            .await?;

        Ok(format!(
            "Deployed NFT collection {} to address {}\nTransaction signature: {}",
            parsed.name, receipt.mint, receipt.signature
        ))
    }
}

// =============================================================================
// mint_nft - Mint one NFT from an existing collection
// =============================================================================

#[derive(Debug)]
pub struct MintNftAction {
    meta: ActionMetadata,
}

impl MintNftAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required(
                "contract_address",
                FieldType::String,
                "Address of the collection to mint from",
            ),
            FieldSpec::required(
                "destination",
                FieldType::String,
                "Wallet address that receives the NFT",
            ),
        ]);

        let examples = vec![ActionExample {
            input: json!({
                "contract_address": "7nE9GvcNzKp2WkR7oyaNVakFbgrDdZ7FCLj8rnUpbuvG",
                "destination": "8x2dR8Mpzuz2YqyZyZjUbYWKSWesBo5jMx2Q9Y86udVk",
            }),
            output: "Minted NFT from collection 7nE9Gvc... to address 8x2dR8M...\n\
                     Mint: 9pQ4...\nTransaction signature: 3kL8..."
                .to_string(),
            explanation: "Mint from a collection into another wallet".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "mint_nft".to_string(),
            name: "Mint NFT".to_string(),
            prompt: "This tool mints a single NFT from an existing collection. Inputs:\n\
                     - contract_address: address of the collection, e.g. one returned by deploy_nft\n\
                     - destination: wallet address that should own the new NFT\n\
                     The NFT copies the collection's name, symbol and metadata URI."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for MintNftAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            contract_address: String,
            destination: String,
        }

        let parsed: Input = args.parse()?;
        let collection = parse_address("contract_address", &parsed.contract_address)?;
        let destination = parse_address("destination", &parsed.destination)?;

        let receipt = ctx.nft()?.mint_nft(collection, destination).await?;
        Ok(format!(
            "Minted NFT from collection {} to address {}\nMint: {}\nTransaction signature: {}",
            parsed.contract_address, parsed.destination, receipt.mint, receipt.signature
        ))
    }
}

// =============================================================================
// Register NFT actions
// =============================================================================

pub fn register_nft_actions(registry: &mut ActionRegistry) -> Result<(), ActionError> {
    registry.register(DeployNftAction::new())?;
    registry.register(MintNftAction::new())?;
    Ok(())
}

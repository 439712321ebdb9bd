use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;

use crate::actions::{Action, ActionExample, ActionMetadata, ActionRegistry};
use crate::context::ExecutionContext;
use crate::error::ActionError;
use crate::schema::{ActionArgs, FieldSpec, FieldType, Schema};

pub(crate) fn parse_address(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("{field} '{value}' is not a valid address"))
}

fn parse_amount(value: Option<&Value>) -> Result<BigDecimal> {
    let value = value.ok_or_else(|| anyhow!("amount is required"))?;
    let text = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    BigDecimal::from_str(&text).with_context(|| format!("amount '{text}' is not a decimal number"))
}

// =============================================================================
// get_wallet_details - Address and network of the agent's wallet
// =============================================================================

#[derive(Debug)]
pub struct GetWalletDetailsAction {
    meta: ActionMetadata,
}

impl GetWalletDetailsAction {
    pub fn new() -> Self {
        let examples = vec![ActionExample {
            input: json!({}),
            output: "Wallet: 8x2dR8Mpzuz2YqyZyZjUbYWKSWesBo5jMx2Q9Y86udVk on network: solana-devnet"
                .to_string(),
            explanation: "Show which wallet the agent signs with".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "get_wallet_details".to_string(),
            name: "Get wallet details".to_string(),
            prompt: "This tool returns the address of the agent's wallet and the network it is \
                     connected to. It takes no inputs."
                .to_string(),
            schema: Schema::empty(),
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for GetWalletDetailsAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, _args: ActionArgs) -> Result<String> {
        let token = ctx.token()?;
        Ok(format!(
            "Wallet: {} on network: {}",
            token.address(),
            token.network()
        ))
    }
}

// =============================================================================
// get_balance - SOL or SPL token balance of the wallet
// =============================================================================

#[derive(Debug)]
pub struct GetBalanceAction {
    meta: ActionMetadata,
}

impl GetBalanceAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::optional(
            "asset_id",
            FieldType::String,
            "Mint address of the SPL token to check; omit for native SOL",
        )
        .example("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v")]);

        let examples = vec![
            ActionExample {
                input: json!({}),
                output: "Balance of SOL: 1.5".to_string(),
                explanation: "Get the SOL balance of the wallet".to_string(),
            },
            ActionExample {
                input: json!({ "asset_id": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v" }),
                output: "Balance of EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v: 100".to_string(),
                explanation: "Get the USDC balance of the wallet".to_string(),
            },
        ];

        let meta = ActionMetadata {
            mode: "get_balance".to_string(),
            name: "Get balance".to_string(),
            prompt: "This tool returns the balance of the agent's wallet. Input:\n\
                     - asset_id (optional): mint address of an SPL token. When omitted the \
                     native SOL balance is returned."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for GetBalanceAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            asset_id: Option<String>,
        }

        let parsed: Input = args.parse()?;
        let mint = parsed
            .asset_id
            .as_deref()
            .map(|mint| parse_address("asset_id", mint))
            .transpose()?;

        let balance = ctx.token()?.get_balance(mint).await?;
        let asset = parsed.asset_id.unwrap_or_else(|| "SOL".to_string());
        Ok(format!("Balance of {asset}: {balance}"))
    }
}

// =============================================================================
// request_faucet_funds - Airdrop on devnet/testnet
// =============================================================================

#[derive(Debug)]
pub struct RequestFaucetFundsAction {
    meta: ActionMetadata,
}

impl RequestFaucetFundsAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![FieldSpec::with_default(
            "amount",
            FieldType::Number,
            "Amount of SOL to request",
            1,
        )]);

        let examples = vec![ActionExample {
            input: json!({}),
            output: "Received 1 SOL from the faucet.\nTransaction signature: 5abc123...".to_string(),
            explanation: "Request test SOL on devnet".to_string(),
        }];

        let meta = ActionMetadata {
            mode: "request_faucet_funds".to_string(),
            name: "Request faucet funds".to_string(),
            prompt: "This tool requests test SOL from the faucet. It only works on devnet and \
                     testnet. Input:\n\
                     - amount (optional, default 1): how much SOL to request."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for RequestFaucetFundsAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        let amount = parse_amount(args.get("amount"))?;
        let token = ctx.token()?;
        if token.network().contains("mainnet") {
            bail!("faucet funds are only available on devnet and testnet");
        }

        let signature = token.request_airdrop(amount.clone()).await?;
        Ok(format!(
            "Received {amount} SOL from the faucet.\nTransaction signature: {signature}"
        ))
    }
}

// =============================================================================
// transfer - Send SOL or SPL tokens
// =============================================================================

#[derive(Debug)]
pub struct TransferAction {
    meta: ActionMetadata,
}

impl TransferAction {
    pub fn new() -> Self {
        let schema = Schema::new(vec![
            FieldSpec::required("amount", FieldType::Number, "Amount to send, in whole units")
                .example("0.1"),
            FieldSpec::required("destination", FieldType::String, "Recipient wallet address"),
            FieldSpec::optional(
                "asset_id",
                FieldType::String,
                "Mint address of the SPL token to send; omit for native SOL",
            ),
        ]);

        let examples = vec![
            ActionExample {
                input: json!({
                    "amount": 0.1,
                    "destination": "ExampleDestination1111111111111111111111111111",
                }),
                output: "Transferred 0.1 SOL to ExampleDestination1111111111111111111111111111.\n\
                         Transaction signature: example_signature"
                    .to_string(),
                explanation: "Send 0.1 SOL".to_string(),
            },
            ActionExample {
                input: json!({
                    "amount": 5,
                    "destination": "ExampleDestination1111111111111111111111111111",
                    "asset_id": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                }),
                output: "Transferred 5 EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v to \
                         ExampleDestination1111111111111111111111111111.\n\
                         Transaction signature: example_token_signature"
                    .to_string(),
                explanation: "Send 5 USDC".to_string(),
            },
        ];

        let meta = ActionMetadata {
            mode: "transfer".to_string(),
            name: "Transfer".to_string(),
            prompt: "This tool transfers SOL or an SPL token from the agent's wallet to another \
                     address. Inputs:\n\
                     - amount: how much to send, in whole units (e.g. 0.1 SOL, not lamports)\n\
                     - destination: the recipient's wallet address\n\
                     - asset_id (optional): mint address of the SPL token; omit to send SOL\n\
                     The recipient's token account is created when it does not exist yet."
                .to_string(),
            schema,
            examples,
        };

        Self { meta }
    }
}

#[async_trait]
impl Action for TransferAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.meta
    }

    async fn invoke(&self, ctx: &mut ExecutionContext, args: ActionArgs) -> Result<String> {
        #[derive(Deserialize)]
        struct Input {
            destination: String,
            asset_id: Option<String>,
        }

        let parsed: Input = args.parse()?;
        let amount = parse_amount(args.get("amount"))?;
        let to = parse_address("destination", &parsed.destination)?;
        let mint = parsed
            .asset_id
            .as_deref()
            .map(|mint| parse_address("asset_id", mint))
            .transpose()?;

        let signature = ctx.token()?.transfer(to, amount.clone(), mint).await?;
        let asset = parsed.asset_id.unwrap_or_else(|| "SOL".to_string());
        Ok(format!(
            "Transferred {amount} {asset} to {}.\nTransaction signature: {signature}",
            parsed.destination
        ))
    }
}

// =============================================================================
// Register token actions
// =============================================================================

pub fn register_token_actions(registry: &mut ActionRegistry) -> Result<(), ActionError> {
    registry.register(GetWalletDetailsAction::new())?;
    registry.register(GetBalanceAction::new())?;
    registry.register(RequestFaucetFundsAction::new())?;
    registry.register(TransferAction::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_keep_their_decimal_text() {
        let amount = parse_amount(Some(&json!(0.1))).expect("number parses");
        assert_eq!(amount, BigDecimal::from_str("0.1").unwrap());

        let amount = parse_amount(Some(&json!("2.50"))).expect("string parses");
        assert_eq!(amount, BigDecimal::from_str("2.5").unwrap());

        assert!(parse_amount(Some(&json!("ten"))).is_err());
    }

    #[test]
    fn bad_addresses_name_the_field() {
        let error = parse_address("destination", "not-a-key").expect_err("invalid key");
        assert!(error.to_string().contains("destination"));
    }
}

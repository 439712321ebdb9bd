//! Solana backend for token and NFT actions.

use std::str::FromStr;
use std::sync::Arc;

use agentkit_nft::{MintReceipt, NftActions};
use agentkit_token::TokenActions;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use mpl_token_metadata::accounts::Metadata;
use mpl_token_metadata::instructions::{
    CreateMasterEditionV3, CreateMasterEditionV3InstructionArgs, CreateMetadataAccountV3,
    CreateMetadataAccountV3InstructionArgs,
};
use mpl_token_metadata::types::{Collection, CollectionDetails, Creator, DataV2};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use solana_sdk::transaction::VersionedTransaction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::instruction as token_instruction;

use crate::wallet::{place_signature, Wallet};

const SOL_DECIMALS: u8 = 9;

/// Token and NFT backend that signs with the agent's wallet and submits through one RPC endpoint.
pub struct SolanaChain {
    client: RpcClient,
    wallet: Arc<dyn Wallet>,
}

impl SolanaChain {
    pub fn new(wallet: Arc<dyn Wallet>, rpc_url: &str) -> Self {
        Self {
            wallet,
            client: RpcClient::new(rpc_url.to_string()),
        }
    }

    /// Compiles, signs (extra signers first, then the wallet) and confirms.
    async fn send(&self, instructions: &[Instruction], extra_signers: &[&Keypair]) -> Result<Signature> {
        let payer = self.wallet.pubkey();
        let blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .context("fetching latest blockhash")?;
        let message = VersionedMessage::V0(v0::Message::try_compile(
            &payer,
            instructions,
            &[],
            blockhash,
        )?);

        let mut tx = VersionedTransaction {
            signatures: vec![],
            message,
        };
        let message_bytes = tx.message.serialize();
        for signer in extra_signers {
            let signature = signer.sign_message(&message_bytes);
            place_signature(&mut tx, &signer.pubkey(), signature)?;
        }
        let tx = self.wallet.sign_transaction(tx).await?;

        tracing::debug!(instructions = instructions.len(), "sending transaction");
        self.client
            .send_and_confirm_transaction(&tx)
            .await
            .context("sending transaction")
    }

    /// Instructions that create a one-of-one NFT held by `owner`, plus the
    /// metadata PDA and token account they create.
    async fn nft_instructions(
        &self,
        mint: &Pubkey,
        owner: &Pubkey,
        data: DataV2,
        collection_details: Option<CollectionDetails>,
    ) -> Result<(Vec<Instruction>, Pubkey, Pubkey)> {
        let payer = self.wallet.pubkey();
        let mint_rent = self
            .client
            .get_minimum_balance_for_rent_exemption(spl_token::state::Mint::LEN)
            .await
            .context("fetching mint rent")?;

        let token_account = get_associated_token_address(owner, mint);
        let metadata = metadata_pda(mint);
        let edition = edition_pda(mint);

        let mut instructions = vec![
            system_instruction::create_account(
                &payer,
                mint,
                mint_rent,
                spl_token::state::Mint::LEN as u64,
                &spl_token::id(),
            ),
            token_instruction::initialize_mint(&spl_token::id(), mint, &payer, Some(&payer), 0)?,
            create_associated_token_account_idempotent(&payer, owner, mint, &spl_token::id()),
            token_instruction::mint_to(&spl_token::id(), mint, &token_account, &payer, &[], 1)?,
        ];

        let create_metadata = CreateMetadataAccountV3 {
            metadata,
            mint: *mint,
            mint_authority: payer,
            payer,
            update_authority: (payer, true),
            system_program: solana_sdk::system_program::id(),
            rent: None,
        };
        instructions.push(create_metadata.instruction(CreateMetadataAccountV3InstructionArgs {
            data,
            is_mutable: true,
            collection_details,
        }));

        // max_supply of 0 makes the edition a true one-of-one.
        let create_edition = CreateMasterEditionV3 {
            edition,
            mint: *mint,
            update_authority: payer,
            mint_authority: payer,
            payer,
            metadata,
            token_program: spl_token::id(),
            system_program: solana_sdk::system_program::id(),
            rent: None,
        };
        instructions.push(create_edition.instruction(CreateMasterEditionV3InstructionArgs {
            max_supply: Some(0),
        }));

        Ok((instructions, metadata, token_account))
    }
}

#[async_trait]
impl TokenActions for SolanaChain {
    fn address(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    fn network(&self) -> String {
        let url = self.client.url();
        ["mainnet", "devnet", "testnet"]
            .into_iter()
            .find(|cluster| url.contains(cluster))
            .map(|cluster| format!("solana-{cluster}"))
            .unwrap_or(url)
    }

    async fn transfer(&self, to: Pubkey, amount: BigDecimal, mint: Option<Pubkey>) -> Result<String> {
        let payer = self.wallet.pubkey();

        let instructions = match mint {
            None => {
                let lamports = to_base_units(&amount, SOL_DECIMALS)?;
                vec![system_instruction::transfer(&payer, &to, lamports)]
            }
            Some(mint) => {
                let data = self
                    .client
                    .get_account_data(&mint)
                    .await
                    .with_context(|| format!("fetching mint {mint}"))?;
                let decimals = spl_token::state::Mint::unpack(&data)
                    .map_err(|err| anyhow!("{mint} is not a token mint: {err}"))?
                    .decimals;
                let base_units = to_base_units(&amount, decimals)?;
                let source = get_associated_token_address(&payer, &mint);
                let destination = get_associated_token_address(&to, &mint);
                vec![
                    create_associated_token_account_idempotent(&payer, &to, &mint, &spl_token::id()),
                    token_instruction::transfer_checked(
                        &spl_token::id(),
                        &source,
                        &mint,
                        &destination,
                        &payer,
                        &[],
                        base_units,
                        decimals,
                    )?,
                ]
            }
        };

        let signature = self.send(&instructions, &[]).await?;
        Ok(signature.to_string())
    }

    async fn get_balance(&self, mint: Option<Pubkey>) -> Result<BigDecimal> {
        let owner = self.wallet.pubkey();
        match mint {
            None => {
                let lamports = self
                    .client
                    .get_balance(&owner)
                    .await
                    .context("fetching SOL balance")?;
                from_base_units(lamports, SOL_DECIMALS)
            }
            Some(mint) => {
                let account = get_associated_token_address(&owner, &mint);
                let balance = self
                    .client
                    .get_token_account_balance(&account)
                    .await
                    .with_context(|| format!("no token account for mint {mint}"))?;
                let raw: u64 = balance
                    .amount
                    .parse()
                    .with_context(|| format!("unexpected token amount '{}'", balance.amount))?;
                from_base_units(raw, balance.decimals)
            }
        }
    }

    async fn request_airdrop(&self, amount: BigDecimal) -> Result<String> {
        let lamports = to_base_units(&amount, SOL_DECIMALS)?;
        let signature = self
            .client
            .request_airdrop(&self.wallet.pubkey(), lamports)
            .await
            .context("requesting airdrop")?;
        self.client
            .poll_for_signature(&signature)
            .await
            .context("confirming airdrop")?;
        Ok(signature.to_string())
    }
}

#[async_trait]
impl NftActions for SolanaChain {
    async fn deploy_collection(&self, name: &str, symbol: &str, uri: &str) -> Result<MintReceipt> {
        let payer = self.wallet.pubkey();
        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();

        let data = DataV2 {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: uri.to_string(),
            seller_fee_basis_points: 0,
            creators: Some(vec![Creator {
                address: payer,
                verified: true,
                share: 100,
            }]),
            collection: None,
            uses: None,
        };
        let (instructions, metadata, token_account) = self
            .nft_instructions(&mint, &payer, data, Some(CollectionDetails::V1 { size: 0 }))
            .await?;

        let signature = self.send(&instructions, &[&mint_keypair]).await?;
        Ok(MintReceipt {
            mint,
            metadata,
            token_account,
            signature: signature.to_string(),
        })
    }

    async fn mint_nft(&self, collection: Pubkey, destination: Pubkey) -> Result<MintReceipt> {
        let payer = self.wallet.pubkey();
        let collection_data = self
            .client
            .get_account_data(&metadata_pda(&collection))
            .await
            .with_context(|| format!("fetching metadata of collection {collection}"))?;
        let collection_metadata = Metadata::from_bytes(&collection_data)
            .with_context(|| format!("{collection} has no readable token metadata"))?;

        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();
        // Membership stays unverified until the collection authority verifies it.
        let data = DataV2 {
            name: collection_metadata.name.trim_end_matches('\0').to_string(),
            symbol: collection_metadata.symbol.trim_end_matches('\0').to_string(),
            uri: collection_metadata.uri.trim_end_matches('\0').to_string(),
            seller_fee_basis_points: collection_metadata.seller_fee_basis_points,
            creators: Some(vec![Creator {
                address: payer,
                verified: true,
                share: 100,
            }]),
            collection: Some(Collection {
                verified: false,
                key: collection,
            }),
            uses: None,
        };
        let (instructions, metadata, token_account) =
            self.nft_instructions(&mint, &destination, data, None).await?;

        let signature = self.send(&instructions, &[&mint_keypair]).await?;
        Ok(MintReceipt {
            mint,
            metadata,
            token_account,
            signature: signature.to_string(),
        })
    }
}

fn metadata_pda(mint: &Pubkey) -> Pubkey {
    let seeds: &[&[u8]] = &[b"metadata", mpl_token_metadata::ID.as_ref(), mint.as_ref()];
    Pubkey::find_program_address(seeds, &mpl_token_metadata::ID).0
}

fn edition_pda(mint: &Pubkey) -> Pubkey {
    let seeds: &[&[u8]] = &[
        b"metadata",
        mpl_token_metadata::ID.as_ref(),
        mint.as_ref(),
        b"edition",
    ];
    Pubkey::find_program_address(seeds, &mpl_token_metadata::ID).0
}

/// Converts a UI amount into integer base units, refusing fractional dust.
pub(crate) fn to_base_units(amount: &BigDecimal, decimals: u8) -> Result<u64> {
    let factor = 10u64
        .checked_pow(u32::from(decimals))
        .ok_or_else(|| anyhow!("unsupported decimals: {decimals}"))?;
    let scaled = amount.clone() * BigDecimal::from(factor);

    if scaled <= BigDecimal::from(0) {
        bail!("amount must be positive, got {amount}");
    }
    if scaled.with_scale(0) != scaled {
        bail!("amount {amount} has more than {decimals} decimal places");
    }
    scaled
        .to_u64()
        .ok_or_else(|| anyhow!("amount {amount} is too large"))
}

/// Renders integer base units as a UI amount without trailing zeros.
pub(crate) fn from_base_units(raw: u64, decimals: u8) -> Result<BigDecimal> {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    let text = if decimals == 0 {
        digits
    } else {
        let padded = format!("{digits:0>width$}", width = decimals + 1);
        let (whole, fraction) = padded.split_at(padded.len() - decimals);
        let fraction = fraction.trim_end_matches('0');
        if fraction.is_empty() {
            whole.to_string()
        } else {
            format!("{whole}.{fraction}")
        }
    };
    BigDecimal::from_str(&text).map_err(|err| anyhow!("invalid amount '{text}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decimal(text: &str) -> BigDecimal {
        BigDecimal::from_str(text).expect("valid decimal")
    }

    #[test]
    fn ui_amounts_convert_to_base_units_exactly() {
        assert_eq!(to_base_units(&decimal("0.1"), 9).unwrap(), 100_000_000);
        assert_eq!(to_base_units(&decimal("2"), 6).unwrap(), 2_000_000);
        assert!(to_base_units(&decimal("0.0000000001"), 9).is_err());
        assert!(to_base_units(&decimal("0"), 9).is_err());
        assert!(to_base_units(&decimal("-1"), 9).is_err());
    }

    #[test]
    fn base_units_render_without_trailing_zeros() {
        assert_eq!(from_base_units(1_500_000_000, 9).unwrap().to_string(), "1.5");
        assert_eq!(from_base_units(5, 9).unwrap(), decimal("0.000000005"));
        assert_eq!(from_base_units(42, 0).unwrap().to_string(), "42");
        assert_eq!(from_base_units(3_000_000, 6).unwrap().to_string(), "3");
    }
}

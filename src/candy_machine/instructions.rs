//! Mint transaction planning
//!
//! A mint transaction creates the NFT mint and the buyer's token account,
//! mints the single token, then calls the candy machine `mint_nft`
//! instruction, which must be the only candy machine instruction in the
//! transaction and must come last.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_instruction, system_program, sysvar,
};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account,
};
use spl_token::solana_program::program_pack::Pack;
use thiserror::Error;

use super::state::{anchor_discriminator, SaleState, WhitelistMintMode};
use super::{GATEWAY_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Instruction build error (program={program}): {reason}")]
    Instruction { program: String, reason: String },

    #[error("Invalid instruction order: {0}")]
    InvalidOrder(String),
}

/// Ordered instructions for one mint, plus the accounts the caller must sign for
#[derive(Debug, Clone)]
pub struct MintPlan {
    pub instructions: Vec<Instruction>,
    pub mint: Pubkey,
    pub gateway_token: Option<Pubkey>,
}

/// Accounts the buyer supplies for one mint
#[derive(Debug, Clone, Copy)]
pub struct MintAccounts {
    pub program_id: Pubkey,
    pub payer: Pubkey,
    /// Fresh mint account for the NFT; its keypair co-signs the transaction
    pub mint: Pubkey,
    pub gateway_token: Option<Pubkey>,
}

pub fn candy_machine_creator(program_id: &Pubkey, candy_machine: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[b"candy_machine", candy_machine.as_ref()], program_id)
}

pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

pub fn master_edition_address(mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            b"metadata",
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            b"edition",
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .0
}

/// Gateway token PDA held by `owner` on `gatekeeper_network`
pub fn gateway_token_address(owner: &Pubkey, gatekeeper_network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[
            owner.as_ref(),
            b"gateway",
            &[0u8; 8],
            gatekeeper_network.as_ref(),
        ],
        &GATEWAY_PROGRAM_ID,
    )
    .0
}

pub fn network_expire_address(gatekeeper_network: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[gatekeeper_network.as_ref(), b"expire"],
        &GATEWAY_PROGRAM_ID,
    )
    .0
}

/// Build the candy machine `mint_nft` instruction
pub fn mint_nft_instruction(
    sale: &SaleState,
    accounts: &MintAccounts,
) -> Result<Instruction, BuildError> {
    let program_id = accounts.program_id;
    let payer = accounts.payer;
    let mint = accounts.mint;
    let (creator, creator_bump) = candy_machine_creator(&program_id, &sale.address);

    let mut metas = vec![
        AccountMeta::new(sale.address, false),
        AccountMeta::new_readonly(creator, false),
        AccountMeta::new(payer, true),
        AccountMeta::new(sale.treasury, false),
        AccountMeta::new(metadata_address(&mint), false),
        AccountMeta::new(mint, false),
        AccountMeta::new_readonly(payer, true),
        AccountMeta::new_readonly(payer, true),
        AccountMeta::new(master_edition_address(&mint), false),
        AccountMeta::new_readonly(TOKEN_METADATA_PROGRAM_ID, false),
        AccountMeta::new_readonly(spl_token::id(), false),
        AccountMeta::new_readonly(system_program::id(), false),
        AccountMeta::new_readonly(sysvar::rent::id(), false),
        AccountMeta::new_readonly(sysvar::clock::id(), false),
        AccountMeta::new_readonly(sysvar::slot_hashes::id(), false),
        AccountMeta::new_readonly(sysvar::instructions::id(), false),
    ];

    if let Some(gatekeeper) = &sale.gatekeeper {
        match accounts.gateway_token {
            Some(token) => {
                metas.push(AccountMeta::new(token, false));
                if gatekeeper.expire_on_use {
                    metas.push(AccountMeta::new_readonly(GATEWAY_PROGRAM_ID, false));
                    metas.push(AccountMeta::new_readonly(
                        network_expire_address(&gatekeeper.gatekeeper_network),
                        false,
                    ));
                }
            }
            // Before go-live the program rejects the mint ahead of the gate check
            None if !sale.is_active => {}
            None => {
                return Err(BuildError::Instruction {
                    program: program_id.to_string(),
                    reason: "sale requires a gateway token".to_string(),
                })
            }
        }
    }

    if let Some(whitelist) = &sale.whitelist_mint_settings {
        metas.push(AccountMeta::new(
            get_associated_token_address(&payer, &whitelist.mint),
            false,
        ));
        if whitelist.mode == WhitelistMintMode::BurnEveryTime {
            metas.push(AccountMeta::new(whitelist.mint, false));
            metas.push(AccountMeta::new_readonly(payer, true));
        }
    }

    if let Some(token_mint) = &sale.token_mint {
        metas.push(AccountMeta::new(
            get_associated_token_address(&payer, token_mint),
            false,
        ));
        metas.push(AccountMeta::new_readonly(payer, true));
    }

    let mut data = anchor_discriminator("global:mint_nft").to_vec();
    data.push(creator_bump);

    Ok(Instruction::new_with_bytes(program_id, &data, metas))
}

/// Plan every instruction of one mint transaction
pub fn plan_mint_instructions(
    sale: &SaleState,
    accounts: &MintAccounts,
    mint_rent_lamports: u64,
) -> Result<MintPlan, BuildError> {
    let payer = accounts.payer;
    let mint = accounts.mint;
    let token_program = spl_token::id();
    let spl_err = |reason: String| BuildError::Instruction {
        program: token_program.to_string(),
        reason,
    };

    let buyer_token_account = get_associated_token_address(&payer, &mint);

    let instructions = vec![
        system_instruction::create_account(
            &payer,
            &mint,
            mint_rent_lamports,
            spl_token::state::Mint::LEN as u64,
            &token_program,
        ),
        spl_token::instruction::initialize_mint(&token_program, &mint, &payer, Some(&payer), 0)
            .map_err(|e| spl_err(e.to_string()))?,
        create_associated_token_account(&payer, &payer, &mint, &token_program),
        spl_token::instruction::mint_to(
            &token_program,
            &mint,
            &buyer_token_account,
            &payer,
            &[],
            1,
        )
        .map_err(|e| spl_err(e.to_string()))?,
        mint_nft_instruction(sale, accounts)?,
    ];

    let plan = MintPlan {
        instructions,
        mint,
        gateway_token: accounts.gateway_token,
    };
    sanity_check_mint_plan(&plan, &accounts.program_id)?;
    Ok(plan)
}

/// Exactly one candy machine instruction, in last position
pub fn sanity_check_mint_plan(plan: &MintPlan, program_id: &Pubkey) -> Result<(), BuildError> {
    let candy_count = plan
        .instructions
        .iter()
        .filter(|ix| ix.program_id == *program_id)
        .count();
    if candy_count != 1 {
        return Err(BuildError::InvalidOrder(format!(
            "expected exactly one candy machine instruction, found {}",
            candy_count
        )));
    }
    match plan.instructions.last() {
        Some(ix) if ix.program_id == *program_id => Ok(()),
        _ => Err(BuildError::InvalidOrder(
            "candy machine instruction must be last".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candy_machine::CANDY_MACHINE_PROGRAM_ID;
    use crate::candy_machine::state::GatekeeperConfig;
    use crate::test_utils::live_sale_state;

    fn accounts(gateway_token: Option<Pubkey>) -> MintAccounts {
        MintAccounts {
            program_id: CANDY_MACHINE_PROGRAM_ID,
            payer: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            gateway_token,
        }
    }

    #[test]
    fn test_plan_has_single_trailing_mint_instruction() {
        let sale = live_sale_state(10);
        let plan = plan_mint_instructions(&sale, &accounts(None), 1_461_600).unwrap();
        assert_eq!(plan.instructions.len(), 5);
        let last = plan.instructions.last().unwrap();
        assert_eq!(last.program_id, CANDY_MACHINE_PROGRAM_ID);
        assert_eq!(&last.data[..8], &anchor_discriminator("global:mint_nft"));
        assert_eq!(last.accounts.len(), 16);
    }

    #[test]
    fn test_gated_sale_requires_token() {
        let mut sale = live_sale_state(10);
        sale.gatekeeper = Some(GatekeeperConfig {
            gatekeeper_network: Pubkey::new_unique(),
            expire_on_use: true,
        });

        let err = mint_nft_instruction(&sale, &accounts(None)).unwrap_err();
        assert!(matches!(err, BuildError::Instruction { .. }));

        let token = Pubkey::new_unique();
        let ix = mint_nft_instruction(&sale, &accounts(Some(token))).unwrap();
        assert_eq!(ix.accounts.len(), 19);
        assert_eq!(ix.accounts[16].pubkey, token);
        assert!(ix.accounts[16].is_writable);
        assert_eq!(ix.accounts[17].pubkey, GATEWAY_PROGRAM_ID);
    }

    #[test]
    fn test_gated_sale_before_go_live_omits_token() {
        let mut sale = live_sale_state(10);
        sale.is_active = false;
        sale.gatekeeper = Some(GatekeeperConfig {
            gatekeeper_network: Pubkey::new_unique(),
            expire_on_use: true,
        });

        let ix = mint_nft_instruction(&sale, &accounts(None)).unwrap();
        assert_eq!(ix.accounts.len(), 16);
        assert!(ix.accounts.iter().all(|m| m.pubkey != GATEWAY_PROGRAM_ID));
    }

    #[test]
    fn test_sanity_check_rejects_duplicate_mint_instruction() {
        let sale = live_sale_state(10);
        let accts = accounts(None);
        let mut plan = plan_mint_instructions(&sale, &accts, 1).unwrap();
        let extra = plan.instructions.last().cloned().unwrap();
        plan.instructions.push(extra);
        assert!(matches!(
            sanity_check_mint_plan(&plan, &accts.program_id),
            Err(BuildError::InvalidOrder(_))
        ));
    }

    #[test]
    fn test_gateway_token_is_deterministic() {
        let owner = Pubkey::new_unique();
        let network = Pubkey::new_unique();
        assert_eq!(
            gateway_token_address(&owner, &network),
            gateway_token_address(&owner, &network)
        );
        assert_ne!(
            gateway_token_address(&owner, &network),
            gateway_token_address(&Pubkey::new_unique(), &network)
        );
    }
}

//! Built-in system program: transfers and account creation

use crate::{
    error::ProcessorError,
    meter::costs,
    processor::InstructionProcessor,
    types::{AccountState, LoadedAccount, StateDelta},
};
use solana_sdk::{
    instruction::Instruction, pubkey::Pubkey, system_instruction::SystemInstruction,
    system_program,
};
use tracing::debug;

/// Processor for `system_program::ID`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessor;

impl InstructionProcessor for SystemProcessor {
    fn process(
        &self,
        instruction: &Instruction,
        accounts: &[LoadedAccount],
    ) -> Result<StateDelta, ProcessorError> {
        let decoded: SystemInstruction = bincode::deserialize(&instruction.data)
            .map_err(|_| ProcessorError::InvalidInstructionData)?;

        let delta = match decoded {
            SystemInstruction::Transfer { lamports } => transfer(accounts, lamports)?,
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => create_account(accounts, lamports, space, owner)?,
            SystemInstruction::Assign { owner } => assign(accounts, owner)?,
            SystemInstruction::Allocate { space } => allocate(accounts, space)?,
            other => {
                debug!("Unsupported system instruction: {:?}", other);
                return Err(ProcessorError::InvalidInstructionData);
            }
        };

        Ok(delta.with_compute_units(costs::SYSTEM_INSTRUCTION))
    }
}

fn account_at(accounts: &[LoadedAccount], position: usize) -> Result<&LoadedAccount, ProcessorError> {
    accounts
        .get(position)
        .ok_or(ProcessorError::MissingAccount {
            expected: position + 1,
        })
}

fn require_signer(account: &LoadedAccount) -> Result<(), ProcessorError> {
    if account.meta.is_signer {
        Ok(())
    } else {
        Err(ProcessorError::MissingRequiredSignature(*account.pubkey()))
    }
}

/// An account is free when it holds nothing and nobody else owns it
fn is_unused(account: &AccountState) -> bool {
    account.lamports == 0 && account.data.is_empty() && account.owner == system_program::ID
}

fn debit(account: &LoadedAccount, lamports: u64) -> Result<AccountState, ProcessorError> {
    let mut state = account.state_or_default();
    state.lamports = state
        .lamports
        .checked_sub(lamports)
        .ok_or(ProcessorError::InsufficientFunds {
            account: *account.pubkey(),
            needed: lamports,
            available: state.lamports,
        })?;
    Ok(state)
}

fn transfer(accounts: &[LoadedAccount], lamports: u64) -> Result<StateDelta, ProcessorError> {
    let from = account_at(accounts, 0)?;
    let to = account_at(accounts, 1)?;
    require_signer(from)?;

    let debited = debit(from, lamports)?;
    if from.pubkey() == to.pubkey() {
        return Ok(StateDelta::default().with_account(*from.pubkey(), from.state_or_default()));
    }

    let mut credited = to.state_or_default();
    credited.lamports = credited
        .lamports
        .checked_add(lamports)
        .ok_or(ProcessorError::InvalidInstructionData)?;

    Ok(StateDelta::default()
        .with_account(*from.pubkey(), debited)
        .with_account(*to.pubkey(), credited))
}

fn create_account(
    accounts: &[LoadedAccount],
    lamports: u64,
    space: u64,
    owner: Pubkey,
) -> Result<StateDelta, ProcessorError> {
    let funder = account_at(accounts, 0)?;
    let created = account_at(accounts, 1)?;
    require_signer(funder)?;
    require_signer(created)?;

    if funder.pubkey() == created.pubkey() || !is_unused(&created.state_or_default()) {
        return Err(ProcessorError::AccountAlreadyInitialized(*created.pubkey()));
    }

    let space = usize::try_from(space).map_err(|_| ProcessorError::InvalidInstructionData)?;
    let debited = debit(funder, lamports)?;
    let new_account = AccountState {
        lamports,
        data: vec![0; space],
        owner,
        executable: false,
        rent_epoch: 0,
    };

    Ok(StateDelta::default()
        .with_account(*funder.pubkey(), debited)
        .with_account(*created.pubkey(), new_account))
}

fn assign(accounts: &[LoadedAccount], owner: Pubkey) -> Result<StateDelta, ProcessorError> {
    let target = account_at(accounts, 0)?;
    require_signer(target)?;

    let mut state = target.state_or_default();
    state.owner = owner;
    Ok(StateDelta::default().with_account(*target.pubkey(), state))
}

fn allocate(accounts: &[LoadedAccount], space: u64) -> Result<StateDelta, ProcessorError> {
    let target = account_at(accounts, 0)?;
    require_signer(target)?;

    let mut state = target.state_or_default();
    if !state.data.is_empty() || state.owner != system_program::ID {
        return Err(ProcessorError::AccountAlreadyInitialized(*target.pubkey()));
    }
    let space = usize::try_from(space).map_err(|_| ProcessorError::InvalidInstructionData)?;
    state.data = vec![0; space];
    Ok(StateDelta::default().with_account(*target.pubkey(), state))
}

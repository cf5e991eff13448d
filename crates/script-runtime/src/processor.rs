//! Instruction dispatch to program processors

use crate::{
    accounts::AccountOverlay,
    error::ProcessorError,
    meter::{categories, BudgetExceeded, ComputeTracker},
    system::SystemProcessor,
    types::{LoadedAccount, StateDelta},
};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey, system_program};
use std::collections::HashMap;
use tracing::debug;

// ================================
// Processor Interface
// ================================

/// An on-chain program as seen by the runtime
#[cfg_attr(test, mockall::automock)]
pub trait InstructionProcessor {
    /// Execute `instruction` against the loaded account states and return
    /// the post-state of every account it wrote
    fn process(
        &self,
        instruction: &Instruction,
        accounts: &[LoadedAccount],
    ) -> Result<StateDelta, ProcessorError>;
}

/// Routes instructions to the processor registered for their program id
#[derive(Default)]
pub struct ProgramRegistry {
    programs: HashMap<Pubkey, Box<dyn InstructionProcessor + Send + Sync>>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the system program
    pub fn with_system_program() -> Self {
        let mut registry = Self::new();
        registry.register(system_program::ID, SystemProcessor);
        registry
    }

    /// Register `processor` for `program_id`, replacing any previous entry
    pub fn register(
        &mut self,
        program_id: Pubkey,
        processor: impl InstructionProcessor + Send + Sync + 'static,
    ) {
        self.programs.insert(program_id, Box::new(processor));
    }

    pub fn contains(&self, program_id: &Pubkey) -> bool {
        self.programs.contains_key(program_id)
    }
}

impl InstructionProcessor for ProgramRegistry {
    fn process(
        &self,
        instruction: &Instruction,
        accounts: &[LoadedAccount],
    ) -> Result<StateDelta, ProcessorError> {
        self.programs
            .get(&instruction.program_id)
            .ok_or(ProcessorError::UnknownProgram(instruction.program_id))?
            .process(instruction, accounts)
    }
}

// ================================
// Delta Verification
// ================================

/// Check that a processor only changed what the instruction allows: every
/// changed account must be referenced as writable, and with
/// `enforce_lamport_balance` the written accounts must hold the same
/// lamports in total before and after.
pub fn verify_delta(
    accounts: &[LoadedAccount],
    delta: &StateDelta,
    enforce_lamport_balance: bool,
) -> Result<(), ProcessorError> {
    let mut before: u128 = 0;
    let mut after: u128 = 0;

    for (pubkey, post) in &delta.accounts {
        let mut references = accounts.iter().filter(|loaded| loaded.pubkey() == pubkey);
        let Some(first) = references.next() else {
            return Err(ProcessorError::UnreferencedAccountModified(*pubkey));
        };
        let writable = first.meta.is_writable || references.any(|loaded| loaded.meta.is_writable);

        if !writable && first.state_or_default() != *post {
            return Err(ProcessorError::ReadonlyAccountModified(*pubkey));
        }

        before += u128::from(first.lamports());
        after += u128::from(post.lamports);
    }

    if enforce_lamport_balance && before != after {
        return Err(ProcessorError::UnbalancedInstruction { before, after });
    }
    Ok(())
}

// ================================
// Dispatch
// ================================

/// Failure while dispatching one instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchError {
    Processor(ProcessorError),
    Budget(BudgetExceeded),
}

/// Load, execute, verify and meter a single instruction against the
/// overlay. The caller decides whether to apply the returned delta.
pub(crate) fn dispatch(
    processor: &dyn InstructionProcessor,
    instruction: &Instruction,
    overlay: &AccountOverlay<'_>,
    tracker: &mut ComputeTracker,
    enforce_lamport_balance: bool,
) -> Result<StateDelta, DispatchError> {
    let loaded = overlay.load(instruction);
    let delta = processor
        .process(instruction, &loaded)
        .map_err(DispatchError::Processor)?;

    verify_delta(&loaded, &delta, enforce_lamport_balance).map_err(DispatchError::Processor)?;
    tracker
        .track(categories::INSTRUCTION, delta.compute_units_consumed)
        .map_err(DispatchError::Budget)?;

    debug!(
        "Program {} wrote {} accounts using {} CU",
        instruction.program_id,
        delta.accounts.len(),
        delta.compute_units_consumed
    );
    Ok(delta)
}

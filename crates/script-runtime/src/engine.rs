//! Script execution with synchronous issue/resume.
//!
//! A script body runs as a plain function call. Every `issue` suspends the
//! body only for as long as it takes to authorize, dispatch and apply one
//! instruction; the outcome is handed straight back.

use crate::{
    accounts::{AccountOverlay, AccountReader},
    authorizer::InstructionAuthorizer,
    budget::is_compute_budget_instruction,
    context::ExecutionContext,
    core::ExecutorConfig,
    derivation::{derive, DerivedKey},
    error::ScriptError,
    meter::{categories, costs, BudgetExceeded, ComputeTracker},
    processor::{dispatch, DispatchError, InstructionProcessor},
    types::{AccountState, CommitEffects, ExecutedInstruction, InstructionOutcome, ScriptIdentity},
};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

// ================================
// Script Interface
// ================================

/// A script program's body
pub trait Script {
    fn execute(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), ScriptError>;
}

/// Script bodies by program id, and the instances each program finalized
#[derive(Default, Clone)]
pub struct ScriptRegistry {
    scripts: HashMap<Pubkey, Arc<dyn Script + Send + Sync>>,
    instances: HashMap<Pubkey, Pubkey>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, program_id: Pubkey, script: impl Script + Send + Sync + 'static) {
        self.scripts.insert(program_id, Arc::new(script));
    }

    pub fn get(&self, program_id: &Pubkey) -> Option<&(dyn Script + Send + Sync)> {
        self.scripts.get(program_id).map(|script| script.as_ref())
    }

    pub fn contains(&self, program_id: &Pubkey) -> bool {
        self.scripts.contains_key(program_id)
    }

    /// Create the instance `seed` of `program_id`. Only that program may act
    /// as the instance afterwards.
    pub fn finalize(&mut self, program_id: Pubkey, seed: &[u8]) -> ScriptIdentity {
        let identity = ScriptIdentity::finalize(&program_id, seed);
        debug!("Finalized script instance {} for program {}", identity, program_id);
        self.instances.insert(*identity.pubkey(), program_id);
        identity
    }

    /// The program that finalized `identity`, if any
    pub fn instance_program(&self, identity: &ScriptIdentity) -> Option<&Pubkey> {
        self.instances.get(identity.pubkey())
    }
}

// ================================
// Execution Session
// ================================

/// State shared by every instruction of one transaction: the account
/// overlay, the compute meter and the program dispatch table
pub struct ExecutionSession<'a> {
    processor: &'a dyn InstructionProcessor,
    config: &'a ExecutorConfig,
    overlay: AccountOverlay<'a>,
    tracker: ComputeTracker,
}

impl<'a> ExecutionSession<'a> {
    pub fn new(
        processor: &'a dyn InstructionProcessor,
        accounts: &'a dyn AccountReader,
        config: &'a ExecutorConfig,
        compute_budget: u64,
    ) -> Self {
        Self {
            processor,
            config,
            overlay: AccountOverlay::new(accounts),
            tracker: ComputeTracker::new(compute_budget),
        }
    }

    pub fn overlay(&self) -> &AccountOverlay<'a> {
        &self.overlay
    }

    /// Run `instruction` through its processor and fold the result into the
    /// overlay. `index` is recorded as the instruction's declared position.
    pub(crate) fn execute(
        &mut self,
        index: usize,
        instruction: &Instruction,
        derived_signers: Vec<Pubkey>,
    ) -> Result<ExecutedInstruction, DispatchError> {
        let delta = dispatch(
            self.processor,
            instruction,
            &self.overlay,
            &mut self.tracker,
            self.config.enforce_lamport_balance,
        )?;

        let executed = ExecutedInstruction {
            index,
            program_id: instruction.program_id,
            delta,
            derived_signers,
        };
        self.overlay.apply(executed.clone());
        Ok(executed)
    }

    pub(crate) fn charge(&mut self, category: &'static str, units: u64) -> Result<(), BudgetExceeded> {
        self.tracker.track(category, units)
    }

    pub fn into_effects(self) -> CommitEffects {
        self.tracker.log_breakdown();
        let used = self.tracker.used();
        self.overlay.into_effects(used)
    }
}

// ================================
// Invocation
// ================================

/// The script's view of its own execution
pub struct Invocation<'i, 'a> {
    accounts: &'a [AccountMeta],
    payload: &'a [u8],
    context: &'i mut ExecutionContext<'a>,
    session: &'i mut ExecutionSession<'a>,
}

impl<'i, 'a> Invocation<'i, 'a> {
    pub fn script_identity(&self) -> &ScriptIdentity {
        self.context.script()
    }

    /// Accounts of the script instruction; the first is the script identity
    pub fn accounts(&self) -> &'a [AccountMeta] {
        self.accounts
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Current in-transaction state of `pubkey`
    pub fn account(&self, pubkey: &Pubkey) -> Option<AccountState> {
        self.session.overlay.get(pubkey)
    }

    pub fn derived_key(&self, index: u64) -> DerivedKey {
        derive(self.context.script(), index)
    }

    /// Let the `index`-th derived key sign subsequent issued instructions
    pub fn sign_with(&mut self, index: u64) -> DerivedKey {
        let key = derive(self.context.script(), index);
        self.context.grant(key);
        key
    }

    /// Declared instructions left to issue. Compute budget requests in the
    /// suffix are never issued and do not count.
    pub fn remaining(&self) -> usize {
        self.context.declared()[self.context.cursor()..]
            .iter()
            .filter(|instruction| !is_compute_budget_instruction(instruction))
            .count()
    }

    /// Issue the next instruction. Once any issue fails, every later call
    /// returns that same failure without doing anything.
    pub fn issue(&mut self, instruction: Instruction) -> Result<InstructionOutcome, ScriptError> {
        if let Some(failure) = self.context.failure() {
            return Err(failure.clone());
        }

        self.try_issue(&instruction).map_err(|err| {
            warn!("Script {} issue failed: {}", self.context.script(), err);
            self.context.fail(err.clone());
            err
        })
    }

    fn try_issue(&mut self, proposed: &Instruction) -> Result<InstructionOutcome, ScriptError> {
        self.session
            .charge(categories::ISSUE, costs::ISSUE_OVERHEAD)
            .map_err(budget_exceeded)?;

        let matched = InstructionAuthorizer::match_next(self.context, proposed)?;
        let position = self.context.script_index() + 1 + matched.index;

        let executed = self
            .session
            .execute(position, matched.instruction, matched.derived_signers)
            .map_err(|err| match err {
                DispatchError::Processor(source) => ScriptError::Processor {
                    index: matched.index,
                    source,
                },
                DispatchError::Budget(exceeded) => budget_exceeded(exceeded),
            })?;

        debug!("Script {} issued slot {}", self.context.script(), matched.index);
        Ok(InstructionOutcome {
            index: matched.index,
            program_id: executed.program_id,
            delta: executed.delta,
        })
    }
}

fn budget_exceeded(exceeded: BudgetExceeded) -> ScriptError {
    ScriptError::ComputeBudgetExceeded {
        limit: exceeded.limit,
    }
}

// ================================
// Engine
// ================================

pub struct ScriptExecutionEngine;

impl ScriptExecutionEngine {
    /// Run `script` for the script instruction `instruction`.
    ///
    /// The body must issue exactly the instructions in `context`'s declared
    /// suffix. A failure recorded during any `issue` takes precedence over
    /// whatever the body returned.
    pub fn run<'a>(
        script: &dyn Script,
        instruction: &'a Instruction,
        context: &mut ExecutionContext<'a>,
        session: &mut ExecutionSession<'a>,
    ) -> Result<(), ScriptError> {
        let invocation_cost = session.config.script_invocation_compute_units;
        session
            .charge(categories::SCRIPT, invocation_cost)
            .map_err(budget_exceeded)?;

        debug!(
            "Running script {} over {} declared instructions",
            context.script(),
            context.declared().len()
        );

        let body = {
            let mut invocation = Invocation {
                accounts: &instruction.accounts,
                payload: &instruction.data,
                context: &mut *context,
                session: &mut *session,
            };
            script.execute(&mut invocation)
        };

        if let Some(failure) = context.failure() {
            return Err(failure.clone());
        }
        if let Err(err) = body {
            return Err(match err {
                ScriptError::Aborted(reason) => ScriptError::Aborted(reason),
                other => ScriptError::Aborted(other.to_string()),
            });
        }
        context.skip_compute_budget();
        if context.remaining() > 0 {
            return Err(ScriptError::UnconsumedInstructions {
                consumed: context.cursor(),
                declared: context.declared().len(),
            });
        }
        Ok(())
    }
}

//! Transaction validation and atomic execution.
//!
//! A transaction moves `Pending -> Executing -> Committed | RolledBack`.
//! Nothing is ever written through the caller's `AccountReader`: all writes
//! land in the session overlay and only leave it as `CommitEffects`.

use crate::{
    accounts::AccountReader,
    authorizer::unauthorized_signer,
    budget::{is_compute_budget_instruction, ComputeBudgetRequest},
    context::ExecutionContext,
    core::{ConfigError, ExecutorConfig},
    engine::{ExecutionSession, Script, ScriptExecutionEngine, ScriptRegistry},
    error::{Result, TransactionError},
    processor::{DispatchError, InstructionProcessor, ProgramRegistry},
    signing::{verify_transaction, Ed25519Verifier, SignatureVerifier},
    types::{CommitEffects, ScriptIdentity, ScriptTransaction},
};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

// ================================
// Transaction Status
// ================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    Pending,
    Executing,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Executing => write!(f, "executing"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::RolledBack => write!(f, "rolled back"),
        }
    }
}

// ================================
// Validator
// ================================

/// Validates and executes script transactions.
///
/// Holds only shared, read-only state, so one validator can serve any number
/// of independent transactions concurrently.
pub struct TransactionValidator {
    config: ExecutorConfig,
    programs: ProgramRegistry,
    scripts: ScriptRegistry,
    verifier: Box<dyn SignatureVerifier + Send + Sync>,
}

impl TransactionValidator {
    /// Validator with the system program and ed25519 verification
    pub fn new(config: ExecutorConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            programs: ProgramRegistry::with_system_program(),
            scripts: ScriptRegistry::new(),
            verifier: Box::new(Ed25519Verifier),
        })
    }

    pub fn with_verifier(mut self, verifier: impl SignatureVerifier + Send + Sync + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn register_program(
        &mut self,
        program_id: Pubkey,
        processor: impl InstructionProcessor + Send + Sync + 'static,
    ) {
        self.programs.register(program_id, processor);
    }

    pub fn register_script(&mut self, program_id: Pubkey, script: impl Script + Send + Sync + 'static) {
        self.scripts.register(program_id, script);
    }

    /// Finalize the instance `seed` of the script program `program_id`.
    /// Script instructions naming the returned identity only run under
    /// `program_id`.
    pub fn finalize_instance(&mut self, program_id: &Pubkey, seed: &[u8]) -> ScriptIdentity {
        self.scripts.finalize(*program_id, seed)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Validate and execute `transaction` against `accounts`. Returns the
    /// full effects on commit or the first failure in declared order.
    pub fn submit(
        &self,
        transaction: &ScriptTransaction,
        accounts: &dyn AccountReader,
    ) -> Result<CommitEffects> {
        TransactionExecution::new(transaction).execute(self, accounts)
    }
}

// ================================
// Transaction Execution
// ================================

/// One pass of a transaction through the validator's state machine
#[derive(Debug)]
pub struct TransactionExecution<'t> {
    transaction: &'t ScriptTransaction,
    status: TransactionStatus,
}

impl<'t> TransactionExecution<'t> {
    pub fn new(transaction: &'t ScriptTransaction) -> Self {
        Self {
            transaction,
            status: TransactionStatus::Pending,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Drive the transaction to `Committed` or `RolledBack`. Running again
    /// starts over from `Pending`; the reader is never mutated so the result
    /// is the same.
    pub fn execute(
        &mut self,
        validator: &TransactionValidator,
        accounts: &dyn AccountReader,
    ) -> Result<CommitEffects> {
        self.status = TransactionStatus::Pending;
        let instructions = &self.transaction.instructions;
        info!(
            "Submitting transaction with {} instructions and {} signatures",
            instructions.len(),
            self.transaction.signatures.len()
        );

        let result = self.run(validator, accounts);
        match &result {
            Ok(effects) => {
                self.transition(TransactionStatus::Committed);
                info!(
                    "Committed {} instructions, {} accounts written, {} CU",
                    effects.executed.len(),
                    effects.accounts.len(),
                    effects.compute_units_consumed
                );
            }
            Err(err) => {
                self.transition(TransactionStatus::RolledBack);
                warn!("Transaction rolled back: {}", err);
            }
        }
        result
    }

    fn run(&mut self, validator: &TransactionValidator, accounts: &dyn AccountReader) -> Result<CommitEffects> {
        let transaction = self.transaction;
        let declared = transaction.instructions.len();
        let max = validator.config.max_declared_instructions;
        if declared > max {
            return Err(TransactionError::TooManyInstructions { declared, max });
        }

        let signers = verify_transaction(validator.verifier.as_ref(), transaction)?;
        let budget = ComputeBudgetRequest::from_instructions(&transaction.instructions)?;

        self.transition(TransactionStatus::Executing);
        let mut session = ExecutionSession::new(
            &validator.programs,
            accounts,
            &validator.config,
            budget.compute_unit_limit(&validator.config),
        );

        let mut index = 0;
        while index < declared {
            let instruction = &transaction.instructions[index];
            if is_compute_budget_instruction(instruction) {
                index += 1;
                continue;
            }
            index += match validator.scripts.get(&instruction.program_id) {
                Some(script) => execute_script(
                    &validator.scripts,
                    script,
                    index,
                    &transaction.instructions,
                    &signers,
                    &mut session,
                )?,
                None => {
                    execute_plain(index, instruction, &signers, &mut session)?;
                    1
                }
            };
        }

        Ok(session.into_effects())
    }

    fn transition(&mut self, next: TransactionStatus) {
        debug!("Transaction {} -> {}", self.status, next);
        self.status = next;
    }
}

/// Execute a top-level program instruction. Only client signatures count.
fn execute_plain(
    index: usize,
    instruction: &Instruction,
    signers: &HashSet<Pubkey>,
    session: &mut ExecutionSession<'_>,
) -> Result<()> {
    if let Some(account) = unauthorized_signer(instruction, |key| signers.contains(key)) {
        return Err(TransactionError::MissingSignature { index, account });
    }

    session
        .execute(index, instruction, Vec::new())
        .map_err(|err| match err {
            DispatchError::Processor(source) => TransactionError::ProcessorError { index, source },
            DispatchError::Budget(exceeded) => TransactionError::ComputeBudgetExceeded {
                limit: exceeded.limit,
            },
        })?;
    Ok(())
}

/// Hand the suffix after `index` to the script and return how many declared
/// instructions the script instruction accounted for, itself included
fn execute_script<'a>(
    scripts: &ScriptRegistry,
    script: &dyn Script,
    index: usize,
    instructions: &'a [Instruction],
    signers: &'a HashSet<Pubkey>,
    session: &mut ExecutionSession<'a>,
) -> Result<usize> {
    let instruction = &instructions[index];
    let identity = instruction
        .accounts
        .first()
        .map(|meta| ScriptIdentity::from_pubkey(meta.pubkey))
        .ok_or(TransactionError::MissingScriptInstance { index })?;

    // Derived keys belong to the instance, so only its own program may run as it
    if scripts.instance_program(&identity) != Some(&instruction.program_id) {
        return Err(TransactionError::ScriptInstanceMismatch {
            index,
            instance: *identity.pubkey(),
            program: instruction.program_id,
        });
    }

    if let Some(account) = unauthorized_signer(instruction, |key| signers.contains(key)) {
        return Err(TransactionError::MissingSignature { index, account });
    }

    let mut context = ExecutionContext::new(identity, index, &instructions[index + 1..], signers);
    ScriptExecutionEngine::run(script, instruction, &mut context, session)
        .map_err(|err| TransactionError::from_script(index, err))?;

    debug!(
        "Script {} at {} consumed {} instructions",
        identity,
        index,
        context.cursor()
    );
    Ok(1 + context.cursor())
}

//! Error taxonomy for script execution.
//!
//! Errors are layered the way control flows: the authorizer and program
//! processors raise their own errors, the engine folds them into
//! `ScriptError`, and the validator surfaces exactly one `TransactionError`
//! per rejected transaction. Every variant is terminal for the transaction.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use thiserror::Error;

// ================================
// Mismatch Classification
// ================================

/// Which part of a proposed instruction diverged from its declared template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MismatchField {
    ProgramId,
    Accounts,
    Payload,
}

impl fmt::Display for MismatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchField::ProgramId => write!(f, "program id"),
            MismatchField::Accounts => write!(f, "accounts"),
            MismatchField::Payload => write!(f, "payload"),
        }
    }
}

// ================================
// Authorization Errors
// ================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    #[error("Script issued more instructions than the {declared} declared")]
    ExhaustedInstructions { declared: usize },

    #[error("Instruction {index} does not match its declaration: {field} differs")]
    InstructionMismatch { index: usize, field: MismatchField },

    #[error("Instruction {index} requires a signature from {account}")]
    MissingSignature { index: usize, account: Pubkey },
}

// ================================
// Processor Errors
// ================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessorError {
    #[error("Unknown program: {0}")]
    UnknownProgram(Pubkey),

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Instruction expects at least {expected} accounts")]
    MissingAccount { expected: usize },

    #[error("Account {0} must sign")]
    MissingRequiredSignature(Pubkey),

    #[error("Account {account} holds {available} lamports, {needed} needed")]
    InsufficientFunds {
        account: Pubkey,
        needed: u64,
        available: u64,
    },

    #[error("Account {0} is already in use")]
    AccountAlreadyInitialized(Pubkey),

    #[error("Read-only account {0} was modified")]
    ReadonlyAccountModified(Pubkey),

    #[error("Account {0} was modified but is not referenced by the instruction")]
    UnreferencedAccountModified(Pubkey),

    #[error("Instruction changed total lamports from {before} to {after}")]
    UnbalancedInstruction { before: u128, after: u128 },

    #[error("Custom program error: {0:#x}")]
    Custom(u32),
}

// ================================
// Script Errors
// ================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Instruction {index} failed: {source}")]
    Processor {
        index: usize,
        #[source]
        source: ProcessorError,
    },

    #[error("Compute budget of {limit} units exceeded")]
    ComputeBudgetExceeded { limit: u64 },

    #[error("Script finished after consuming {consumed} of {declared} declared instructions")]
    UnconsumedInstructions { consumed: usize, declared: usize },

    #[error("Script aborted: {0}")]
    Aborted(String),
}

// ================================
// Transaction Errors
// ================================

/// The single failure reported for a rolled back transaction.
///
/// Script-scoped indices (`ExhaustedInstructions`, `InstructionMismatch`,
/// `UnconsumedInstructions`) count slots of the script's declared suffix;
/// `script_index` locates the script instruction itself. All other indices
/// are positions in the full declared vector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("Signature from {signer} is invalid")]
    SignatureInvalid { signer: Pubkey },

    #[error("Transaction declares {declared} instructions, limit is {max}")]
    TooManyInstructions { declared: usize, max: usize },

    #[error("Instruction {index} requires a signature from {account}")]
    MissingSignature { index: usize, account: Pubkey },

    #[error("Script instruction {index} does not name a script instance")]
    MissingScriptInstance { index: usize },

    #[error("Script instruction {index}: instance {instance} does not belong to program {program}")]
    ScriptInstanceMismatch {
        index: usize,
        instance: Pubkey,
        program: Pubkey,
    },

    #[error("Instruction {index} repeats a compute budget request")]
    DuplicateInstruction { index: usize },

    #[error("Script at {script_index} issued more than the {declared} declared instructions")]
    ExhaustedInstructions { script_index: usize, declared: usize },

    #[error("Script at {script_index}: instruction {index} mismatch in {field}")]
    InstructionMismatch {
        script_index: usize,
        index: usize,
        field: MismatchField,
    },

    #[error("Script at {script_index} consumed {consumed} of {declared} declared instructions")]
    UnconsumedInstructions {
        script_index: usize,
        consumed: usize,
        declared: usize,
    },

    #[error("Instruction {index} failed: {source}")]
    ProcessorError {
        index: usize,
        #[source]
        source: ProcessorError,
    },

    #[error("Compute budget of {limit} units exceeded")]
    ComputeBudgetExceeded { limit: u64 },

    #[error("Script at {script_index} aborted: {reason}")]
    ScriptAborted { script_index: usize, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransactionError {
    /// Lift a script failure into the transaction taxonomy. `script_index`
    /// is the script instruction's position; processor indices are rebased
    /// from suffix slots to absolute positions.
    pub fn from_script(script_index: usize, error: ScriptError) -> Self {
        match error {
            ScriptError::Authorization(AuthorizationError::ExhaustedInstructions { declared }) => {
                Self::ExhaustedInstructions {
                    script_index,
                    declared,
                }
            }
            ScriptError::Authorization(AuthorizationError::InstructionMismatch {
                index,
                field,
            }) => Self::InstructionMismatch {
                script_index,
                index,
                field,
            },
            ScriptError::Authorization(AuthorizationError::MissingSignature { index, account }) => {
                Self::MissingSignature {
                    index: script_index + 1 + index,
                    account,
                }
            }
            ScriptError::Processor { index, source } => Self::ProcessorError {
                index: script_index + 1 + index,
                source,
            },
            ScriptError::ComputeBudgetExceeded { limit } => Self::ComputeBudgetExceeded { limit },
            ScriptError::UnconsumedInstructions { consumed, declared } => {
                Self::UnconsumedInstructions {
                    script_index,
                    consumed,
                    declared,
                }
            }
            ScriptError::Aborted(reason) => Self::ScriptAborted {
                script_index,
                reason,
            },
        }
    }
}

impl From<bincode::Error> for TransactionError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransactionError>;

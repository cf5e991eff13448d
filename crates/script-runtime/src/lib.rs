//! Script Runtime
//!
//! Executes transactions whose instructions may be issued by scripts. A client
//! declares the full instruction vector up front and signs it; scripts replay
//! that vector one instruction at a time and may sign with keys derived from
//! their own identity. Any divergence rolls the whole transaction back.

// ================================
// Module Declarations
// ================================

pub mod core;
pub mod error;
pub mod types;

// Account state and overlays
pub mod accounts;

// Program dispatch
pub mod processor;
pub mod system;
pub mod meter;
pub mod budget;

// Script execution
pub mod derivation;
pub mod context;
pub mod authorizer;
pub mod engine;

// Validation and signatures
pub mod signing;
pub mod validator;

// ================================
// Public API Re-exports
// ================================

// Configuration and errors
pub use crate::core::{init_tracing, ConfigError, ExecutorConfig};
pub use error::{
    AuthorizationError, MismatchField, ProcessorError, Result, ScriptError, TransactionError,
};

// Accounts and programs
pub use accounts::{AccountOverlay, AccountReader, AccountsDb};
pub use processor::{verify_delta, InstructionProcessor, ProgramRegistry};
pub use system::SystemProcessor;
pub use meter::ComputeTracker;
pub use budget::{is_compute_budget_instruction, ComputeBudgetRequest};

// Scripts
pub use derivation::{derive, derive_address, DerivedKey};
pub use context::ExecutionContext;
pub use authorizer::{InstructionAuthorizer, MatchedInstruction};
pub use engine::{ExecutionSession, Invocation, Script, ScriptExecutionEngine, ScriptRegistry};

// Transactions
pub use signing::{Ed25519Verifier, SignatureVerifier};
pub use validator::{TransactionExecution, TransactionStatus, TransactionValidator};

// Common types
pub use types::{
    AccountState, ClientSignature, CommitEffects, DeclaredInstruction, ExecutedInstruction,
    InstructionOutcome, LoadedAccount, ScriptIdentity, ScriptTransaction, StateDelta,
};

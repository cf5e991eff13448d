//! Common types for the script runtime

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Signature, Signer},
};
use std::collections::BTreeMap;
use std::fmt;

/// Domain tag for script instance finalisation
const SCRIPT_INSTANCE_TAG: &[u8] = b"script-instance";

/// An instruction as authorized by the client
pub type DeclaredInstruction = Instruction;

/// Account state as seen by processors
pub type AccountState = Account;

// ================================
// Script Identity
// ================================

/// Identity of a deployed script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptIdentity(Pubkey);

impl ScriptIdentity {
    /// Finalize a new instance of `script_program`. Instances of the same
    /// program differ only by `instance_seed`.
    pub fn finalize(script_program: &Pubkey, instance_seed: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(SCRIPT_INSTANCE_TAG);
        hasher.update(script_program.as_ref());
        hasher.update(instance_seed);
        Self(Pubkey::new_from_array(hasher.finalize().into()))
    }

    pub const fn from_pubkey(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    pub const fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl fmt::Display for ScriptIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ================================
// Transaction Types
// ================================

/// A client signature over the declared instruction vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSignature {
    pub signer: Pubkey,
    pub signature: Signature,
}

/// Declared instruction vector plus the client signatures authorizing it
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScriptTransaction {
    pub instructions: Vec<DeclaredInstruction>,
    pub signatures: Vec<ClientSignature>,
}

impl ScriptTransaction {
    /// Unsigned transaction over `instructions`
    pub fn new(instructions: Vec<DeclaredInstruction>) -> Self {
        Self {
            instructions,
            signatures: Vec::new(),
        }
    }

    /// Build and sign in one step
    pub fn new_signed(
        instructions: Vec<DeclaredInstruction>,
        signers: &[&dyn Signer],
    ) -> bincode::Result<Self> {
        let mut transaction = Self::new(instructions);
        transaction.sign(signers)?;
        Ok(transaction)
    }

    /// Bytes every client signature commits to
    pub fn message_bytes(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(&self.instructions)
    }

    /// Append a signature from each signer
    pub fn sign(&mut self, signers: &[&dyn Signer]) -> bincode::Result<()> {
        let message = self.message_bytes()?;
        for signer in signers {
            self.signatures.push(ClientSignature {
                signer: signer.pubkey(),
                signature: signer.sign_message(&message),
            });
        }
        Ok(())
    }
}

// ================================
// Processor Input / Output
// ================================

/// An instruction account together with its state before execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedAccount {
    pub meta: AccountMeta,
    /// `None` when the account does not exist yet
    pub state: Option<AccountState>,
}

impl LoadedAccount {
    pub fn pubkey(&self) -> &Pubkey {
        &self.meta.pubkey
    }

    pub fn lamports(&self) -> u64 {
        self.state.as_ref().map_or(0, |account| account.lamports)
    }

    /// Current state, or an empty system-owned account if missing
    pub fn state_or_default(&self) -> AccountState {
        self.state.clone().unwrap_or_default()
    }
}

/// Post-states of the accounts an instruction wrote
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDelta {
    pub accounts: BTreeMap<Pubkey, AccountState>,
    pub compute_units_consumed: u64,
}

impl StateDelta {
    pub fn with_account(mut self, pubkey: Pubkey, account: AccountState) -> Self {
        self.accounts.insert(pubkey, account);
        self
    }

    pub fn with_compute_units(mut self, units: u64) -> Self {
        self.compute_units_consumed = units;
        self
    }
}

/// An instruction that ran during execution, in declared order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedInstruction {
    /// Position in the declared vector
    pub index: usize,
    pub program_id: Pubkey,
    pub delta: StateDelta,
    /// Derived keys that signed this instruction implicitly
    pub derived_signers: Vec<Pubkey>,
}

/// What a script sees after one of its instructions completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionOutcome {
    /// Slot in the script's declared suffix
    pub index: usize,
    pub program_id: Pubkey,
    pub delta: StateDelta,
}

/// Everything a committed transaction changed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommitEffects {
    pub executed: Vec<ExecutedInstruction>,
    /// Final state of every written account
    pub accounts: BTreeMap<Pubkey, AccountState>,
    pub compute_units_consumed: u64,
}

impl CommitEffects {
    pub fn account(&self, pubkey: &Pubkey) -> Option<&AccountState> {
        self.accounts.get(pubkey)
    }
}

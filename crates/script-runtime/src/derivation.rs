//! Deterministic derivation of script-owned signing identities.
//!
//! A derived key is `sha256(sha256(script_identity) || index_le)`. There is
//! no private key behind it; the only way to sign for one is to hold the
//! capability granted inside the owning script's execution context.

use crate::types::ScriptIdentity;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Handle for the `index`-th key owned by a script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DerivedKey {
    script: ScriptIdentity,
    index: u64,
    address: Pubkey,
}

impl DerivedKey {
    pub const fn script(&self) -> &ScriptIdentity {
        &self.script
    }

    pub const fn index(&self) -> u64 {
        self.index
    }

    /// The key as it appears in account references
    pub const fn address(&self) -> &Pubkey {
        &self.address
    }
}

impl fmt::Display for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}#{})", self.address, self.script, self.index)
    }
}

/// Derive the `index`-th key of `script`. Total over the full index space.
pub fn derive(script: &ScriptIdentity, index: u64) -> DerivedKey {
    let namespace = Sha256::digest(script.pubkey().as_ref());

    let mut hasher = Sha256::new();
    hasher.update(namespace);
    hasher.update(index.to_le_bytes());

    DerivedKey {
        script: *script,
        index,
        address: Pubkey::new_from_array(hasher.finalize().into()),
    }
}

/// Address-only shorthand for [`derive`]
pub fn derive_address(script: &ScriptIdentity, index: u64) -> Pubkey {
    *derive(script, index).address()
}

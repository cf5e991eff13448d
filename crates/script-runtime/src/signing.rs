//! Client signature verification

use crate::{error::TransactionError, types::ScriptTransaction};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::collections::HashSet;
use tracing::warn;

/// Checks a signature over a message
#[cfg_attr(test, mockall::automock)]
pub trait SignatureVerifier {
    fn verify(&self, pubkey: &Pubkey, message: &[u8], signature: &Signature) -> bool;
}

/// Ed25519 verification of client signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, pubkey: &Pubkey, message: &[u8], signature: &Signature) -> bool {
        signature.verify(pubkey.as_ref(), message)
    }
}

/// Verify every client signature on `transaction` and return the set of
/// keys that signed. One bad signature rejects the whole transaction.
pub fn verify_transaction(
    verifier: &dyn SignatureVerifier,
    transaction: &ScriptTransaction,
) -> Result<HashSet<Pubkey>, TransactionError> {
    let message = transaction.message_bytes()?;
    let mut signers = HashSet::with_capacity(transaction.signatures.len());

    for entry in &transaction.signatures {
        if !verifier.verify(&entry.signer, &message, &entry.signature) {
            warn!("Rejecting signature from {}", entry.signer);
            return Err(TransactionError::SignatureInvalid {
                signer: entry.signer,
            });
        }
        signers.insert(entry.signer);
    }
    Ok(signers)
}

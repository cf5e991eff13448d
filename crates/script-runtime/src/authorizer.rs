//! Exact-match authorization of script-issued instructions.
//!
//! A script may only issue what the client declared, in declared order. Each
//! proposal is compared field by field against the instruction at the
//! context's cursor; the first field that differs is reported and the cursor
//! stays where it was.

use crate::{
    context::ExecutionContext,
    error::{AuthorizationError, MismatchField},
};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use tracing::debug;

/// A proposal that matched its declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedInstruction<'a> {
    /// Slot in the script's declared suffix
    pub index: usize,
    pub instruction: &'a Instruction,
    /// Granted derived keys that sign this instruction
    pub derived_signers: Vec<Pubkey>,
}

pub struct InstructionAuthorizer;

impl InstructionAuthorizer {
    /// Match `proposed` against the next declared instruction and advance
    /// the cursor on success
    pub fn match_next<'a>(
        context: &mut ExecutionContext<'a>,
        proposed: &Instruction,
    ) -> Result<MatchedInstruction<'a>, AuthorizationError> {
        context.skip_compute_budget();
        let index = context.cursor();
        let declared = context
            .peek()
            .ok_or(AuthorizationError::ExhaustedInstructions {
                declared: context.declared().len(),
            })?;

        if let Some(field) = first_mismatch(declared, proposed) {
            debug!("Slot {} rejected: {} differs from declaration", index, field);
            return Err(AuthorizationError::InstructionMismatch { index, field });
        }

        if let Some(account) = unauthorized_signer(declared, |pubkey| context.authorizes(pubkey)) {
            return Err(AuthorizationError::MissingSignature { index, account });
        }

        // Client signatures take precedence over a granted key for the same account
        let mut derived_signers = Vec::new();
        for meta in declared.accounts.iter().filter(|meta| meta.is_signer) {
            if !context.is_client_signer(&meta.pubkey) && !derived_signers.contains(&meta.pubkey) {
                derived_signers.push(meta.pubkey);
            }
        }

        context.advance();
        Ok(MatchedInstruction {
            index,
            instruction: declared,
            derived_signers,
        })
    }
}

/// First field of `proposed` that differs from `declared`, in the order
/// program id, accounts, payload
pub fn first_mismatch(declared: &Instruction, proposed: &Instruction) -> Option<MismatchField> {
    if declared.program_id != proposed.program_id {
        Some(MismatchField::ProgramId)
    } else if !accounts_match(&declared.accounts, &proposed.accounts) {
        Some(MismatchField::Accounts)
    } else if declared.data != proposed.data {
        Some(MismatchField::Payload)
    } else {
        None
    }
}

fn accounts_match(declared: &[AccountMeta], proposed: &[AccountMeta]) -> bool {
    declared.len() == proposed.len()
        && declared.iter().zip(proposed).all(|(d, p)| {
            d.pubkey == p.pubkey && d.is_signer == p.is_signer && d.is_writable == p.is_writable
        })
}

/// First `is_signer` account of `instruction` that `is_authorized` rejects
pub fn unauthorized_signer(
    instruction: &Instruction,
    is_authorized: impl Fn(&Pubkey) -> bool,
) -> Option<Pubkey> {
    instruction
        .accounts
        .iter()
        .find(|meta| meta.is_signer && !is_authorized(&meta.pubkey))
        .map(|meta| meta.pubkey)
}

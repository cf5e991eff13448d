//! Per-script execution state

use crate::{
    budget::is_compute_budget_instruction, derivation::DerivedKey, error::ScriptError,
    types::ScriptIdentity,
};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::{BTreeMap, HashSet};

/// Cursor over the instructions a script instance is allowed to issue.
///
/// `declared` is the suffix of the transaction that follows the script
/// instruction. The cursor only moves forward, one slot per successful
/// match, and never past the end of the suffix.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    script: ScriptIdentity,
    script_index: usize,
    declared: &'a [Instruction],
    cursor: usize,
    signers: &'a HashSet<Pubkey>,
    capabilities: BTreeMap<Pubkey, DerivedKey>,
    failure: Option<ScriptError>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        script: ScriptIdentity,
        script_index: usize,
        declared: &'a [Instruction],
        signers: &'a HashSet<Pubkey>,
    ) -> Self {
        Self {
            script,
            script_index,
            declared,
            cursor: 0,
            signers,
            capabilities: BTreeMap::new(),
            failure: None,
        }
    }

    pub const fn script(&self) -> &ScriptIdentity {
        &self.script
    }

    /// Position of the script instruction in the transaction
    pub const fn script_index(&self) -> usize {
        self.script_index
    }

    pub const fn declared(&self) -> &'a [Instruction] {
        self.declared
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.declared.len() - self.cursor
    }

    /// Next declared instruction, if any
    pub fn peek(&self) -> Option<&'a Instruction> {
        self.declared.get(self.cursor)
    }

    pub(crate) fn advance(&mut self) {
        debug_assert!(self.cursor < self.declared.len());
        self.cursor += 1;
    }

    /// Step over compute budget requests at the cursor; they are read
    /// before execution and never issued
    pub(crate) fn skip_compute_budget(&mut self) {
        while self.peek().is_some_and(is_compute_budget_instruction) {
            self.cursor += 1;
        }
    }

    /// Allow `key` to act as a signer. Keys derived from another script
    /// instance are refused.
    pub fn grant(&mut self, key: DerivedKey) -> bool {
        if key.script() != &self.script {
            return false;
        }
        self.capabilities.insert(*key.address(), key);
        true
    }

    /// Granted capability for `pubkey`, if any
    pub fn capability(&self, pubkey: &Pubkey) -> Option<&DerivedKey> {
        self.capabilities.get(pubkey)
    }

    pub fn is_client_signer(&self, pubkey: &Pubkey) -> bool {
        self.signers.contains(pubkey)
    }

    /// Whether `pubkey` may appear as a signer in an issued instruction
    pub fn authorizes(&self, pubkey: &Pubkey) -> bool {
        self.is_client_signer(pubkey) || self.capabilities.contains_key(pubkey)
    }

    /// Record the first failure; later calls keep the original
    pub(crate) fn fail(&mut self, error: ScriptError) {
        if self.failure.is_none() {
            self.failure = Some(error);
        }
    }

    pub fn failure(&self) -> Option<&ScriptError> {
        self.failure.as_ref()
    }
}

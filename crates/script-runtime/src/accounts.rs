//! Account state access.
//!
//! Execution never writes through an `AccountReader`. Every instruction's
//! delta lands in a per-transaction `AccountOverlay`; committing turns the
//! overlay into `CommitEffects`, rolling back simply drops it.

use crate::types::{AccountState, CommitEffects, ExecutedInstruction, LoadedAccount, StateDelta};
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

// ================================
// Account Reader
// ================================

/// Read access to pre-transaction account state
#[cfg_attr(test, mockall::automock)]
pub trait AccountReader {
    /// `None` means the account does not exist
    fn get_account(&self, pubkey: &Pubkey) -> Option<AccountState>;
}

/// In-memory account store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountsDb {
    accounts: HashMap<Pubkey, AccountState>,
}

impl AccountsDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pubkey: Pubkey, account: AccountState) {
        self.accounts.insert(pubkey, account);
    }

    pub fn get(&self, pubkey: &Pubkey) -> Option<&AccountState> {
        self.accounts.get(pubkey)
    }

    /// Persist the effects of a committed transaction
    pub fn apply(&mut self, effects: &CommitEffects) {
        for (pubkey, account) in &effects.accounts {
            self.accounts.insert(*pubkey, account.clone());
        }
        debug!("Applied {} account updates", effects.accounts.len());
    }
}

impl AccountReader for AccountsDb {
    fn get_account(&self, pubkey: &Pubkey) -> Option<AccountState> {
        self.accounts.get(pubkey).cloned()
    }
}

impl FromIterator<(Pubkey, AccountState)> for AccountsDb {
    fn from_iter<I: IntoIterator<Item = (Pubkey, AccountState)>>(iter: I) -> Self {
        Self {
            accounts: iter.into_iter().collect(),
        }
    }
}

// ================================
// Transaction Overlay
// ================================

/// Copy-on-write view of account state for one transaction
pub struct AccountOverlay<'a> {
    base: &'a dyn AccountReader,
    writes: BTreeMap<Pubkey, AccountState>,
    executed: Vec<ExecutedInstruction>,
}

impl<'a> AccountOverlay<'a> {
    pub fn new(base: &'a dyn AccountReader) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
            executed: Vec::new(),
        }
    }

    /// Current in-transaction state of `pubkey`
    pub fn get(&self, pubkey: &Pubkey) -> Option<AccountState> {
        self.writes
            .get(pubkey)
            .cloned()
            .or_else(|| self.base.get_account(pubkey))
    }

    /// Pair every account of `instruction` with its current state
    pub fn load(&self, instruction: &Instruction) -> Vec<LoadedAccount> {
        instruction
            .accounts
            .iter()
            .map(|meta| LoadedAccount {
                meta: meta.clone(),
                state: self.get(&meta.pubkey),
            })
            .collect()
    }

    /// Record an executed instruction and fold its delta into the view
    pub fn apply(&mut self, executed: ExecutedInstruction) {
        for (pubkey, account) in &executed.delta.accounts {
            self.writes.insert(*pubkey, account.clone());
        }
        self.executed.push(executed);
    }

    pub fn executed(&self) -> &[ExecutedInstruction] {
        &self.executed
    }

    pub fn into_effects(self, compute_units_consumed: u64) -> CommitEffects {
        CommitEffects {
            executed: self.executed,
            accounts: self.writes,
            compute_units_consumed,
        }
    }
}

/// Sum of the deltas' writes, later deltas winning
pub fn merge_deltas<'d>(deltas: impl IntoIterator<Item = &'d StateDelta>) -> BTreeMap<Pubkey, AccountState> {
    let mut merged = BTreeMap::new();
    for delta in deltas {
        for (pubkey, account) in &delta.accounts {
            merged.insert(*pubkey, account.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{account::Account, instruction::AccountMeta, system_program};

    fn account(lamports: u64) -> Account {
        Account::new(lamports, 0, &system_program::ID)
    }

    fn executed(index: usize, delta: StateDelta) -> ExecutedInstruction {
        ExecutedInstruction {
            index,
            program_id: system_program::ID,
            delta,
            derived_signers: Vec::new(),
        }
    }

    #[test]
    fn test_overlay_reads_through_to_base() {
        let key = Pubkey::new_unique();
        let db: AccountsDb = [(key, account(10))].into_iter().collect();
        let overlay = AccountOverlay::new(&db);

        assert_eq!(overlay.get(&key), Some(account(10)));
        assert_eq!(overlay.get(&Pubkey::new_unique()), None);
    }

    #[test]
    fn test_overlay_writes_shadow_base_without_touching_it() {
        let key = Pubkey::new_unique();
        let db: AccountsDb = [(key, account(10))].into_iter().collect();
        let snapshot = db.clone();

        let mut overlay = AccountOverlay::new(&db);
        overlay.apply(executed(0, StateDelta::default().with_account(key, account(3))));

        assert_eq!(overlay.get(&key), Some(account(3)));
        drop(overlay);
        assert_eq!(db, snapshot);
    }

    #[test]
    fn test_load_pairs_metas_with_state() {
        let present = Pubkey::new_unique();
        let missing = Pubkey::new_unique();
        let db: AccountsDb = [(present, account(5))].into_iter().collect();
        let overlay = AccountOverlay::new(&db);

        let instruction = Instruction::new_with_bytes(
            system_program::ID,
            &[],
            vec![
                AccountMeta::new(present, true),
                AccountMeta::new_readonly(missing, false),
            ],
        );
        let loaded = overlay.load(&instruction);

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].lamports(), 5);
        assert!(loaded[0].meta.is_signer);
        assert!(loaded[1].state.is_none());
    }

    #[test]
    fn test_effects_apply_to_db() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let mut db: AccountsDb = [(a, account(10))].into_iter().collect();

        let mut overlay = AccountOverlay::new(&db);
        overlay.apply(executed(
            0,
            StateDelta::default()
                .with_account(a, account(4))
                .with_account(b, account(6)),
        ));
        let effects = overlay.into_effects(150);

        db.apply(&effects);
        assert_eq!(db.get(&a), Some(&account(4)));
        assert_eq!(db.get(&b), Some(&account(6)));
        assert_eq!(effects.compute_units_consumed, 150);
    }

    #[test]
    fn test_merge_deltas_later_wins() {
        let key = Pubkey::new_unique();
        let first = StateDelta::default().with_account(key, account(1));
        let second = StateDelta::default().with_account(key, account(2));

        let merged = merge_deltas([&first, &second]);
        assert_eq!(merged.get(&key), Some(&account(2)));
    }

    #[test]
    fn test_mock_reader_backs_overlay() {
        let key = Pubkey::new_unique();
        let mut reader = MockAccountReader::new();
        reader
            .expect_get_account()
            .returning(move |pubkey| (*pubkey == key).then(|| account(42)));

        let overlay = AccountOverlay::new(&reader);
        assert_eq!(overlay.get(&key).map(|a| a.lamports), Some(42));
        assert!(overlay.get(&Pubkey::new_unique()).is_none());
    }
}

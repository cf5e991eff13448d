#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use script_runtime::{
    derive_address, AccountsDb, ExecutorConfig, Invocation, Script, ScriptError, ScriptIdentity,
    ScriptTransaction, TransactionValidator,
};
use solana_sdk::{
    account::Account,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction, system_program,
};

pub const VAULT_INDEX: u64 = 0;
pub const DATA_INDEX: u64 = 1;
pub const VAULT_LAMPORTS: u64 = 1_000;
pub const DATA_RENT: u64 = 10;
pub const DATA_SPACE: u64 = 32;

pub fn script_program() -> Pubkey {
    Pubkey::new_from_array([7; 32])
}

/// Payload of the payout script instruction
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PayoutArgs {
    pub amount: u64,
    pub rent: u64,
    pub space: u64,
}

/// Pays `amount` from the vault to every recipient account of the script
/// instruction, then creates a data account owned by the script program
pub struct Payout;

impl Script for Payout {
    fn execute(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), ScriptError> {
        let args: PayoutArgs = bincode::deserialize(invocation.payload())
            .map_err(|err| ScriptError::Aborted(err.to_string()))?;

        let vault = invocation.sign_with(VAULT_INDEX);
        let data = invocation.sign_with(DATA_INDEX);

        for recipient in invocation.accounts().iter().skip(1) {
            invocation.issue(system_instruction::transfer(
                vault.address(),
                &recipient.pubkey,
                args.amount,
            ))?;
        }
        invocation.issue(system_instruction::create_account(
            vault.address(),
            data.address(),
            args.rent,
            args.space,
            &script_program(),
        ))?;
        Ok(())
    }
}

/// Issues a fixed list of instructions after granting the listed derived
/// keys. With `swallow` set, issue failures are ignored.
pub struct Replay {
    pub grants: Vec<u64>,
    pub issue: Vec<Instruction>,
    pub swallow: bool,
}

impl Script for Replay {
    fn execute(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), ScriptError> {
        for index in &self.grants {
            invocation.sign_with(*index);
        }
        for instruction in &self.issue {
            let result = invocation.issue(instruction.clone());
            if !self.swallow {
                result?;
            }
        }
        Ok(())
    }
}

/// Grants the listed derived keys, then issues `instruction` until no
/// declared instruction is left
pub struct Drain {
    pub grants: Vec<u64>,
    pub instruction: Instruction,
}

impl Script for Drain {
    fn execute(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), ScriptError> {
        for index in &self.grants {
            invocation.sign_with(*index);
        }
        while invocation.remaining() > 0 {
            invocation.issue(self.instruction.clone())?;
        }
        Ok(())
    }
}

pub struct TestContext {
    pub payer: Keypair,
    pub identity: ScriptIdentity,
    pub vault: Pubkey,
    pub data_key: Pubkey,
    pub alice: Pubkey,
    pub bob: Pubkey,
    pub db: AccountsDb,
}

impl TestContext {
    pub fn new() -> Self {
        let identity = ScriptIdentity::finalize(&script_program(), b"treasury");
        let vault = derive_address(&identity, VAULT_INDEX);
        let payer = Keypair::new();

        let mut db = AccountsDb::new();
        db.insert(vault, Account::new(VAULT_LAMPORTS, 0, &system_program::ID));
        db.insert(payer.pubkey(), Account::new(VAULT_LAMPORTS, 0, &system_program::ID));

        Self {
            payer,
            identity,
            vault,
            data_key: derive_address(&identity, DATA_INDEX),
            alice: Pubkey::new_from_array([0xa1; 32]),
            bob: Pubkey::new_from_array([0xb0; 32]),
            db,
        }
    }

    pub fn validator(&self, script: impl Script + Send + Sync + 'static) -> TransactionValidator {
        self.validator_with(ExecutorConfig::default(), script)
    }

    pub fn validator_with(
        &self,
        config: ExecutorConfig,
        script: impl Script + Send + Sync + 'static,
    ) -> TransactionValidator {
        let mut validator = TransactionValidator::new(config).expect("invalid executor config");
        validator.register_script(script_program(), script);
        let identity = validator.finalize_instance(&script_program(), b"treasury");
        assert_eq!(identity, self.identity);
        validator
    }

    /// The script instruction itself
    pub fn script_instruction(&self, amount: u64) -> Instruction {
        Instruction::new_with_bincode(
            script_program(),
            &PayoutArgs {
                amount,
                rent: DATA_RENT,
                space: DATA_SPACE,
            },
            vec![
                AccountMeta::new_readonly(*self.identity.pubkey(), false),
                AccountMeta::new_readonly(self.alice, false),
                AccountMeta::new_readonly(self.bob, false),
            ],
        )
    }

    pub fn transfer_a(&self, amount: u64) -> Instruction {
        system_instruction::transfer(&self.vault, &self.alice, amount)
    }

    pub fn transfer_b(&self, amount: u64) -> Instruction {
        system_instruction::transfer(&self.vault, &self.bob, amount)
    }

    pub fn create_data(&self) -> Instruction {
        system_instruction::create_account(
            &self.vault,
            &self.data_key,
            DATA_RENT,
            DATA_SPACE,
            &script_program(),
        )
    }

    /// `[script, transferA, transferB, create(dataKey)]`
    pub fn declared(&self, amount: u64) -> Vec<Instruction> {
        vec![
            self.script_instruction(amount),
            self.transfer_a(amount),
            self.transfer_b(amount),
            self.create_data(),
        ]
    }

    pub fn sign(&self, instructions: Vec<Instruction>) -> ScriptTransaction {
        ScriptTransaction::new_signed(instructions, &[&self.payer])
            .expect("failed to sign transaction")
    }

    pub fn lamports(&self, pubkey: &Pubkey) -> u64 {
        self.db.get(pubkey).map_or(0, |account| account.lamports)
    }
}

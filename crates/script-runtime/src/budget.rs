//! Client compute budget requests.
//!
//! Compute budget instructions are read once before execution and never
//! dispatched. Only the unit limit and unit price requests are accepted,
//! each at most once per transaction.

use crate::{
    core::ExecutorConfig,
    error::{ProcessorError, TransactionError},
};
use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::Instruction,
};
use tracing::debug;

pub fn is_compute_budget_instruction(instruction: &Instruction) -> bool {
    compute_budget::check_id(&instruction.program_id)
}

/// What the client asked for through compute budget instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComputeBudgetRequest {
    pub compute_unit_limit: Option<u32>,
    pub compute_unit_price: Option<u64>,
    /// Declared instructions that are not budget requests
    pub program_instructions: usize,
}

impl ComputeBudgetRequest {
    /// Scan the declared vector for budget requests
    pub fn from_instructions(instructions: &[Instruction]) -> Result<Self, TransactionError> {
        let mut request = Self::default();

        for (index, instruction) in instructions.iter().enumerate() {
            if !is_compute_budget_instruction(instruction) {
                request.program_instructions += 1;
                continue;
            }

            let invalid = TransactionError::ProcessorError {
                index,
                source: ProcessorError::InvalidInstructionData,
            };
            let duplicate = TransactionError::DuplicateInstruction { index };

            match borsh::from_slice::<ComputeBudgetInstruction>(&instruction.data) {
                Ok(ComputeBudgetInstruction::SetComputeUnitLimit(units)) => {
                    if request.compute_unit_limit.is_some() {
                        return Err(duplicate);
                    }
                    request.compute_unit_limit = Some(units);
                }
                Ok(ComputeBudgetInstruction::SetComputeUnitPrice(micro_lamports)) => {
                    if request.compute_unit_price.is_some() {
                        return Err(duplicate);
                    }
                    request.compute_unit_price = Some(micro_lamports);
                }
                _ => return Err(invalid),
            }
        }

        debug!(
            "Compute budget request: limit {:?}, price {:?}",
            request.compute_unit_limit, request.compute_unit_price
        );
        Ok(request)
    }

    /// The requested limit, or the per-instruction default, capped by the
    /// configured maximum
    pub fn compute_unit_limit(&self, config: &ExecutorConfig) -> u64 {
        self.compute_unit_limit.map_or_else(
            || config.compute_unit_limit(self.program_instructions),
            |units| u64::from(units).min(config.max_compute_unit_limit),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::{pubkey::Pubkey, system_instruction};

    fn transfer() -> Instruction {
        system_instruction::transfer(&Pubkey::new_unique(), &Pubkey::new_unique(), 1)
    }

    #[test]
    fn test_default_limit_counts_program_instructions() {
        let config = ExecutorConfig::default();
        let instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_price(5),
            transfer(),
            transfer(),
        ];

        let request = ComputeBudgetRequest::from_instructions(&instructions).unwrap();
        assert_eq!(request.program_instructions, 2);
        assert_eq!(request.compute_unit_price, Some(5));
        assert_eq!(request.compute_unit_limit(&config), 400_000);
    }

    #[test]
    fn test_requested_limit_is_capped() {
        let config = ExecutorConfig::default();

        let low = ComputeBudgetRequest::from_instructions(&[
            ComputeBudgetInstruction::set_compute_unit_limit(3_000),
            transfer(),
        ])
        .unwrap();
        assert_eq!(low.compute_unit_limit(&config), 3_000);

        let high = ComputeBudgetRequest::from_instructions(&[
            ComputeBudgetInstruction::set_compute_unit_limit(u32::MAX),
        ])
        .unwrap();
        assert_eq!(high.compute_unit_limit(&config), config.max_compute_unit_limit);
    }

    #[test]
    fn test_duplicate_request_is_rejected() {
        let instructions = vec![
            ComputeBudgetInstruction::set_compute_unit_limit(1_000),
            transfer(),
            ComputeBudgetInstruction::set_compute_unit_limit(2_000),
        ];

        assert_eq!(
            ComputeBudgetRequest::from_instructions(&instructions),
            Err(TransactionError::DuplicateInstruction { index: 2 })
        );
    }

    #[test]
    fn test_unsupported_request_is_invalid() {
        let instructions = vec![transfer(), ComputeBudgetInstruction::request_heap_frame(64 * 1024)];

        assert_eq!(
            ComputeBudgetRequest::from_instructions(&instructions),
            Err(TransactionError::ProcessorError {
                index: 1,
                source: ProcessorError::InvalidInstructionData,
            })
        );
    }
}

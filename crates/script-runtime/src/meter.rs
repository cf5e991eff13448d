// Compute unit metering for transaction execution
//
// Every dispatched instruction charges the units its processor reports and
// every script invocation charges a flat entry cost. The budget is fixed
// when the transaction enters execution; running past it rolls the whole
// transaction back.

use std::collections::BTreeMap;
use tracing::debug;

// ================================
// Compute Unit Cost Constants
// ================================

/// Calibrated costs for built-in work
pub mod costs {
    /// Cost of a system program instruction
    pub const SYSTEM_INSTRUCTION: u64 = 150;
    /// Cost charged to the owning script for each `issue`
    pub const ISSUE_OVERHEAD: u64 = 100;
}

/// Category labels used in the usage breakdown
pub mod categories {
    pub const INSTRUCTION: &str = "instruction";
    pub const SCRIPT: &str = "script";
    pub const ISSUE: &str = "issue";
}

// ================================
// Runtime Budget Tracking
// ================================

/// Returned when a charge would push usage past the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExceeded {
    pub limit: u64,
}

/// Per-transaction compute unit tracker
#[derive(Debug, Clone)]
pub struct ComputeTracker {
    /// Total compute units allocated for this transaction
    budget: u64,

    /// Compute units consumed so far
    used: u64,

    /// Usage per category, for diagnostics
    categories: BTreeMap<&'static str, u64>,
}

impl ComputeTracker {
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            used: 0,
            categories: BTreeMap::new(),
        }
    }

    /// Record usage under `category`
    ///
    /// # Errors
    /// Returns `BudgetExceeded` once usage passes the budget; the units are
    /// still recorded so the breakdown shows what tipped it over
    pub fn track(&mut self, category: &'static str, units: u64) -> Result<(), BudgetExceeded> {
        self.used = self.used.saturating_add(units);
        let entry = self.categories.entry(category).or_insert(0);
        *entry = entry.saturating_add(units);

        if self.used > self.budget {
            return Err(BudgetExceeded { limit: self.budget });
        }
        Ok(())
    }

    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used)
    }

    /// Units charged to `category` so far
    #[must_use]
    pub fn used_by(&self, category: &str) -> u64 {
        self.categories.get(category).copied().unwrap_or(0)
    }

    pub fn log_breakdown(&self) {
        debug!("Compute budget: {}/{} CU", self.used, self.budget);
        for (category, units) in &self.categories {
            debug!("  {}: {} CU", category, units);
        }
    }
}

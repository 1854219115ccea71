//! Usage accounting: running token and cost totals against a budget

mod costs;

pub use costs::{CostTable, ModelCost};

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Unknown model '{0}': no entry in the cost table")]
    UnknownModel(String),

    #[error("Token totals would overflow (+{prompt_tokens} prompt, +{completion_tokens} completion)")]
    TokenOverflow {
        prompt_tokens: u64,
        completion_tokens: u64,
    },
}

/// Running usage totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageState {
    /// Prompt tokens accounted so far
    pub total_prompt_tokens: u64,
    /// Completion tokens accounted so far
    pub total_completion_tokens: u64,
    /// Accrued cost (USD)
    pub total_cost: f64,
    /// User-defined ceiling (USD); not enforced here
    pub total_budget: f64,
}

impl UsageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // Nothing is written unless both token totals fit.
    fn apply(
        &mut self,
        prompt_tokens: u64,
        completion_tokens: u64,
        cost: ModelCost,
    ) -> Result<f64, UsageError> {
        let overflow = || UsageError::TokenOverflow {
            prompt_tokens,
            completion_tokens,
        };
        let total_prompt = self
            .total_prompt_tokens
            .checked_add(prompt_tokens)
            .ok_or_else(overflow)?;
        let total_completion = self
            .total_completion_tokens
            .checked_add(completion_tokens)
            .ok_or_else(overflow)?;

        let call_cost = cost.cost_of(prompt_tokens, completion_tokens);
        self.total_prompt_tokens = total_prompt;
        self.total_completion_tokens = total_completion;
        self.total_cost += call_cost;
        Ok(call_cost)
    }

    pub fn remaining_budget(&self) -> f64 {
        self.total_budget - self.total_cost
    }

    /// True once a positive budget has been set and the cost has reached it
    pub fn is_over_budget(&self) -> bool {
        self.total_budget > 0.0 && self.total_cost >= self.total_budget
    }
}

/// Thread-safe usage accumulator.
///
/// Create one at process start and hand clones to every component that
/// needs accounting; clones share the same totals.
#[derive(Clone)]
pub struct UsageTracker {
    inner: Arc<Mutex<UsageState>>,
    costs: Arc<CostTable>,
}

impl UsageTracker {
    pub fn new(costs: CostTable) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageState::new())),
            costs: Arc::new(costs),
        }
    }

    // The state is plain counters, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, UsageState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reset(&self) {
        self.state().reset();
    }

    pub fn set_total_budget(&self, total_budget: f64) {
        if total_budget < 0.0 {
            warn!("Negative budget {} clamped to 0", total_budget);
        }
        self.state().total_budget = total_budget.max(0.0);
    }

    /// Add a call's tokens and cost to the running totals.
    ///
    /// Fails with [`UsageError::UnknownModel`] if the model has no price and
    /// with [`UsageError::TokenOverflow`] if a token total would overflow; in
    /// both cases no total is touched. Returns the cost of this call.
    pub fn update_cost(
        &self,
        prompt_tokens: u64,
        completion_tokens: u64,
        model: &str,
    ) -> Result<f64, UsageError> {
        let cost = self.costs.lookup(model)?;

        let (call_cost, total_cost) = {
            let mut state = self.state();
            let call_cost = state.apply(prompt_tokens, completion_tokens, cost)?;
            (call_cost, state.total_cost)
        };

        debug!("Total running cost: ${:.3}", total_cost);
        Ok(call_cost)
    }

    pub fn total_prompt_tokens(&self) -> u64 {
        self.state().total_prompt_tokens
    }

    pub fn total_completion_tokens(&self) -> u64 {
        self.state().total_completion_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.state().total_cost
    }

    pub fn total_budget(&self) -> f64 {
        self.state().total_budget
    }

    pub fn remaining_budget(&self) -> f64 {
        self.state().remaining_budget()
    }

    pub fn is_over_budget(&self) -> bool {
        self.state().is_over_budget()
    }

    pub fn snapshot(&self) -> UsageState {
        self.state().clone()
    }

    pub fn summary(&self) -> UsageSummary {
        let state = self.snapshot();
        UsageSummary {
            prompt_tokens: state.total_prompt_tokens,
            completion_tokens: state.total_completion_tokens,
            total_cost: state.total_cost,
            total_budget: state.total_budget,
            remaining_budget: state.remaining_budget(),
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(CostTable::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost: f64,
    pub total_budget: f64,
    pub remaining_budget: f64,
}

impl std::fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Usage Summary ===")?;
        writeln!(f, "Prompt tokens: {}", self.prompt_tokens)?;
        writeln!(f, "Completion tokens: {}", self.completion_tokens)?;
        writeln!(f, "Total cost: ${:.4}", self.total_cost)?;
        if self.total_budget > 0.0 {
            writeln!(f, "Budget: ${:.4}", self.total_budget)?;
            writeln!(f, "Remaining: ${:.4}", self.remaining_budget)?;
        } else {
            writeln!(f, "Budget: unlimited")?;
        }
        Ok(())
    }
}

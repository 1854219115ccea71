//! Per-model pricing reference data

use super::UsageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price of one model in USD per 1000 tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    /// Cost per 1K prompt tokens
    pub prompt: f64,
    /// Cost per 1K completion tokens
    pub completion: f64,
}

impl ModelCost {
    pub const fn new(prompt: f64, completion: f64) -> Self {
        Self { prompt, completion }
    }

    /// Both prices finite and not negative
    pub fn is_valid(&self) -> bool {
        [self.prompt, self.completion]
            .iter()
            .all(|price| price.is_finite() && *price >= 0.0)
    }

    /// Cost of a single call with the given token counts
    pub fn cost_of(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        (prompt_tokens as f64 * self.prompt + completion_tokens as f64 * self.completion) / 1000.0
    }
}

const BUILTIN_COSTS: &[(&str, ModelCost)] = &[
    ("gpt-3.5-turbo", ModelCost::new(0.002, 0.002)),
    ("gpt-3.5-turbo-0301", ModelCost::new(0.002, 0.002)),
    ("gpt-4", ModelCost::new(0.03, 0.06)),
    ("gpt-4-0314", ModelCost::new(0.03, 0.06)),
    ("gpt-4-32k", ModelCost::new(0.06, 0.12)),
    ("gpt-4-32k-0314", ModelCost::new(0.06, 0.12)),
    ("text-embedding-ada-002", ModelCost::new(0.0004, 0.0)),
];

/// Mapping from model identifier to its pricing.
///
/// Built once at startup (built-in prices plus any configured overrides) and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CostTable {
    models: BTreeMap<String, ModelCost>,
}

impl CostTable {
    /// The built-in reference prices
    pub fn builtin() -> Self {
        Self {
            models: BUILTIN_COSTS
                .iter()
                .map(|(name, cost)| (name.to_string(), *cost))
                .collect(),
        }
    }

    /// Merge overrides on top of this table, replacing existing entries
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, ModelCost)>,
    {
        self.models.extend(overrides);
        self
    }

    pub fn lookup(&self, model: &str) -> Result<ModelCost, UsageError> {
        self.models
            .get(model)
            .copied()
            .ok_or_else(|| UsageError::UnknownModel(model.to_string()))
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelCost)> {
        self.models.iter().map(|(name, cost)| (name.as_str(), cost))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for CostTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Display for CostTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<26} {:>12} {:>14}", "Model", "Prompt/1K", "Completion/1K")?;
        for (name, cost) in self.iter() {
            writeln!(
                f,
                "{:<26} {:>12} {:>14}",
                name,
                format!("${:.4}", cost.prompt),
                format!("${:.4}", cost.completion)
            )?;
        }
        Ok(())
    }
}

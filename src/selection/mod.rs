//! Reducing the network's candidate responses to one answer

use serde::{Deserialize, Serialize};

/// Returned by [`ResponseSelectionPolicy::LongestResponse`] when nothing usable came back
pub const NO_NETWORK_RESPONSE: &str = "No response from the network";

/// Returned by [`ResponseSelectionPolicy::FilteredBest`] when every candidate is disqualified
pub const NO_RESPONSE_GIVEN: &str = "No response given";

/// Canned text some responders emit instead of answering
pub const CANNED_INQUIRY: &str = "Here is my inquiry: In the context of Fourier";

/// Filler phrase removed from the chosen response
pub const BOILERPLATE_PREFIX: &str = "That is a great question!";

/// How to pick one response out of the network's candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSelectionPolicy {
    /// The longest candidate wins
    #[default]
    LongestResponse,
    /// The first candidate that is neither canned nor trivially short
    FilteredBest,
}

impl ResponseSelectionPolicy {
    pub fn select(&self, candidates: &[String]) -> String {
        match self {
            ResponseSelectionPolicy::LongestResponse => select_longest(candidates),
            ResponseSelectionPolicy::FilteredBest => select_filtered(candidates),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseSelectionPolicy::LongestResponse => "longest",
            ResponseSelectionPolicy::FilteredBest => "filtered-best",
        }
    }
}

impl std::str::FromStr for ResponseSelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "longest" | "longest-response" => Ok(ResponseSelectionPolicy::LongestResponse),
            "filtered" | "filtered-best" => Ok(ResponseSelectionPolicy::FilteredBest),
            other => Err(format!("Unknown selection policy: {}", other)),
        }
    }
}

impl std::fmt::Display for ResponseSelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Length is measured in characters; ties go to the earliest candidate.
fn select_longest(candidates: &[String]) -> String {
    let longest = candidates
        .iter()
        .fold(None::<(&String, usize)>, |best, candidate| {
            let len = candidate.chars().count();
            match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((candidate, len)),
            }
        })
        .map(|(candidate, _)| candidate.as_str())
        .unwrap_or("");

    if longest.is_empty() {
        NO_NETWORK_RESPONSE.to_string()
    } else {
        longest.to_string()
    }
}

fn select_filtered(candidates: &[String]) -> String {
    candidates
        .iter()
        .map(|candidate| candidate.trim())
        .find(|text| !text.contains(CANNED_INQUIRY) && text.chars().count() > 1)
        .map(|text| text.replace(BOILERPLATE_PREFIX, ""))
        .unwrap_or_else(|| NO_RESPONSE_GIVEN.to_string())
}

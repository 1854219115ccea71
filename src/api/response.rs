//! Response structures

use serde::{Deserialize, Serialize};

/// The gateway's answer to a chat completion call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    /// The selected response text
    pub content: String,
}

impl CompletionResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Raw reply from the prompting network
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkReply {
    /// The network's single best response
    Single(String),
    /// Every candidate response, in the order the network returned them
    Candidates(Vec<String>),
}

impl NetworkReply {
    /// Flatten into a candidate list; a single reply is a one-element set
    pub fn into_candidates(self) -> Vec<String> {
        match self {
            NetworkReply::Single(text) => vec![text],
            NetworkReply::Candidates(candidates) => candidates,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            NetworkReply::Single(_) => 1,
            NetworkReply::Candidates(candidates) => candidates.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

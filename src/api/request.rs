//! Request structures for chat completions and network dispatch

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Rewrite every `system` message as a `user` message.
///
/// The prompting network has no notion of system instructions. Order and
/// content are left untouched.
pub fn normalize_roles(messages: &mut [Message]) {
    for message in messages.iter_mut() {
        if message.role == Role::System {
            message.role = Role::User;
        }
    }
}

/// How many responses to ask the network for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Every candidate response
    #[default]
    Candidates,
    /// Only the network's own pick
    Best,
}

impl DispatchMode {
    pub fn return_all(&self) -> bool {
        matches!(self, DispatchMode::Candidates)
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "candidates" | "all" => Ok(DispatchMode::Candidates),
            "best" | "single" => Ok(DispatchMode::Best),
            other => Err(format!("Unknown dispatch mode: {}", other)),
        }
    }
}

/// A chat completion call as made by the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<Message>,
    /// Model to account the call against (gateway default when absent)
    pub model: Option<String>,
    /// Sampling temperature (configured default when absent)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Accepted for compatibility with hosted deployments; unused
    pub deployment_id: Option<String>,
}

impl ChatCompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            max_tokens: None,
            deployment_id: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_deployment_id(mut self, deployment_id: impl Into<String>) -> Self {
        self.deployment_id = Some(deployment_id.into());
        self
    }
}

/// What the gateway hands to the prompting network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRequest {
    /// Normalized messages, in order
    pub messages: Vec<Message>,
    pub timeout: Duration,
    pub mode: DispatchMode,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl NetworkRequest {
    pub fn roles(&self) -> Vec<Role> {
        self.messages.iter().map(|m| m.role).collect()
    }

    pub fn contents(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.content.as_str()).collect()
    }
}

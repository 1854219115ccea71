//! Completion gateway - usage-tracked dispatch to a prompting network
//!
//! This library forwards chat-style conversations to an external network of
//! language-model responders, reduces the candidate responses to one, and
//! keeps running token and cost totals against a user-defined budget.
//!
//! ## Key Features
//!
//! - **Role Normalization**: System instructions are sent as user messages
//! - **Response Selection**: Longest-response or filtered-best policies
//! - **Usage Accounting**: Thread-safe token/cost totals priced per model
//! - **Configuration**: TOML config file with environment overrides

pub mod api;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod selection;

pub use api::{
    ApiError, ChatCompletionRequest, CompletionResult, DispatchMode, HttpPromptingNetwork,
    Message, NetworkConfig, NetworkReply, NetworkRequest, PromptingNetwork, Role,
};
pub use config::{Config, ConfigBuilder, ConfigError};
pub use gateway::{CompletionGateway, GatewayConfig};
pub use metrics::{CostTable, ModelCost, UsageError, UsageState, UsageSummary, UsageTracker};
pub use selection::ResponseSelectionPolicy;

//! Usage-tracked completion gateway
//!
//! Each call runs the same steps in order:
//! - normalize roles (`system` becomes `user`)
//! - dispatch to the prompting network under a fixed timeout
//! - reduce the candidates to one response with the configured policy
//! - account the call against the shared [`UsageTracker`]
//!
//! A failed or timed-out dispatch returns early, so nothing is accounted.

use crate::api::{
    normalize_roles, ApiError, ChatCompletionRequest, CompletionResult, DispatchMode,
    NetworkReply, NetworkRequest, PromptingNetwork,
};
use crate::metrics::{UsageError, UsageTracker};
use crate::selection::ResponseSelectionPolicy;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gateway behaviour, usually derived from the config file
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Model calls are accounted against when the caller names none
    pub model: String,
    /// Temperature used when the caller gives none
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Per-dispatch timeout
    pub timeout: Duration,
    pub mode: DispatchMode,
    pub selection: ResponseSelectionPolicy,
    /// Extra dispatch attempts after a transient failure (0 disables retry)
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(24),
            mode: DispatchMode::Candidates,
            selection: ResponseSelectionPolicy::LongestResponse,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

pub struct CompletionGateway {
    config: GatewayConfig,
    network: Arc<dyn PromptingNetwork>,
    usage: UsageTracker,
}

impl CompletionGateway {
    pub fn new(
        config: GatewayConfig,
        network: Arc<dyn PromptingNetwork>,
        usage: UsageTracker,
    ) -> Self {
        Self {
            config,
            network,
            usage,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared usage handle; clones see the same totals
    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Send a conversation to the network and return the selected response
    pub async fn create_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<CompletionResult, ApiError> {
        if request.messages.is_empty() {
            return Err(ApiError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }

        let ChatCompletionRequest {
            mut messages,
            model,
            temperature,
            max_tokens,
            deployment_id: _,
        } = request;

        normalize_roles(&mut messages);

        let model = model.unwrap_or_else(|| self.config.model.clone());
        let network_request = NetworkRequest {
            messages,
            timeout: self.config.timeout,
            mode: self.config.mode,
            temperature: temperature.unwrap_or(self.config.temperature),
            max_tokens: max_tokens.or(self.config.max_tokens),
        };

        let reply = self.dispatch(network_request).await?;
        let candidate_count = reply.len();
        let content = self.config.selection.select(&reply.into_candidates());

        debug!(
            "Response ({} of {} candidates, {}): {}",
            self.config.selection,
            candidate_count,
            self.network.name(),
            content
        );

        // The network does not report token counts, so calls are accounted as
        // zero tokens until it does.
        let prompt_tokens = 0;
        let completion_tokens = 0;
        self.usage.update_cost(prompt_tokens, completion_tokens, &model)?;

        Ok(CompletionResult::new(content))
    }

    async fn dispatch(&self, request: NetworkRequest) -> Result<NetworkReply, ApiError> {
        let mut retries = 0;

        loop {
            match self.dispatch_once(request.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if e.is_transient() && retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        "Network {} failed: {}, retry {}/{}",
                        self.network.name(),
                        e,
                        retries,
                        self.config.max_retries
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn dispatch_once(&self, request: NetworkRequest) -> Result<NetworkReply, ApiError> {
        let timeout = request.timeout;
        match tokio::time::timeout(timeout, self.network.prompt(request)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout {
                timeout_secs: timeout.as_secs_f64(),
            }),
        }
    }

    pub fn reset(&self) {
        info!("Resetting usage totals");
        self.usage.reset();
    }

    pub fn set_total_budget(&self, total_budget: f64) {
        self.usage.set_total_budget(total_budget);
    }

    pub fn update_cost(
        &self,
        prompt_tokens: u64,
        completion_tokens: u64,
        model: &str,
    ) -> Result<f64, UsageError> {
        self.usage.update_cost(prompt_tokens, completion_tokens, model)
    }

    pub fn total_prompt_tokens(&self) -> u64 {
        self.usage.total_prompt_tokens()
    }

    pub fn total_completion_tokens(&self) -> u64 {
        self.usage.total_completion_tokens()
    }

    pub fn total_cost(&self) -> f64 {
        self.usage.total_cost()
    }

    pub fn total_budget(&self) -> f64 {
        self.usage.total_budget()
    }
}

//! HTTP binding for the prompting network

use super::{ApiError, NetworkReply, NetworkRequest, PromptingNetwork};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Where and how to reach the prompting network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base URL; requests go to `{base_url}/prompt`
    pub base_url: String,
    /// Bearer token, if the network requires one
    pub api_key: Option<String>,
}

impl NetworkConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

/// Prompting network reached over HTTP/JSON
pub struct HttpPromptingNetwork {
    config: NetworkConfig,
    client: Client,
}

impl HttpPromptingNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/prompt", self.config.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &NetworkRequest) -> Value {
        let mut body = json!({
            "roles": request.roles(),
            "messages": request.contents(),
            "timeout": request.timeout.as_secs_f64(),
            "return_all": request.mode.return_all(),
            "temperature": request.temperature,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    fn parse_response(&self, json: Value) -> Result<NetworkReply, ApiError> {
        if let Some(completions) = json["completions"].as_array() {
            // Candidates arrive either as bare strings or as {"completion": "..."}
            let candidates = completions
                .iter()
                .map(|c| {
                    c.as_str()
                        .or_else(|| c["completion"].as_str())
                        .unwrap_or("")
                        .to_string()
                })
                .collect();
            return Ok(NetworkReply::Candidates(candidates));
        }

        if let Some(completion) = json["completion"].as_str() {
            return Ok(NetworkReply::Single(completion.to_string()));
        }

        Err(ApiError::Network(format!(
            "Unrecognized response from network: {}",
            json
        )))
    }
}

#[async_trait]
impl PromptingNetwork for HttpPromptingNetwork {
    async fn prompt(&self, request: NetworkRequest) -> Result<NetworkReply, ApiError> {
        let url = self.endpoint();
        let body = self.build_request(&request);
        let timeout_secs = request.timeout.as_secs_f64();

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(request.timeout)
            .json(&body);

        if let Some(api_key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }

        debug!("Dispatching {} messages to {}", request.messages.len(), url);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout { timeout_secs }
            } else {
                ApiError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let json: Value = response.json().await.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout { timeout_secs }
                } else {
                    ApiError::Http(e)
                }
            })?;
            self.parse_response(json)
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body: error_text,
            })
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DispatchMode, Message, Role};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network_request(mode: DispatchMode) -> NetworkRequest {
        NetworkRequest {
            messages: vec![Message::user("Be brief"), Message::user("What is 6 * 7?")],
            timeout: Duration::from_secs(5),
            mode,
            temperature: 0.5,
            max_tokens: Some(64),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let network = HttpPromptingNetwork::new(NetworkConfig::new("http://localhost:9000/"));
        let body = network.build_request(&network_request(DispatchMode::Best));

        assert_eq!(network.endpoint(), "http://localhost:9000/prompt");
        assert_eq!(body["roles"], json!(["user", "user"]));
        assert_eq!(body["messages"], json!(["Be brief", "What is 6 * 7?"]));
        assert_eq!(body["return_all"], json!(false));
        assert_eq!(body["max_tokens"], json!(64));
        assert_eq!(body["timeout"], json!(5.0));
    }

    #[test]
    fn test_parse_candidate_shapes() {
        let network = HttpPromptingNetwork::new(NetworkConfig::new("http://localhost"));

        let reply = network
            .parse_response(json!({"completions": ["a", {"completion": "bb"}, 3]}))
            .unwrap();
        assert_eq!(
            reply,
            NetworkReply::Candidates(vec!["a".into(), "bb".into(), "".into()])
        );

        let reply = network.parse_response(json!({"completion": "one"})).unwrap();
        assert_eq!(reply, NetworkReply::Single("one".into()));

        assert!(matches!(
            network.parse_response(json!({"text": "?"})),
            Err(ApiError::Network(_))
        ));
    }

    #[tokio::test]
    async fn test_prompt_round_trip() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/prompt"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "roles": ["user", "user"],
                "return_all": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"completions": ["ab", "abcde", "abc"]})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let network = HttpPromptingNetwork::new(
            NetworkConfig::new(mock_server.uri()).with_api_key("secret"),
        );
        let reply = network
            .prompt(network_request(DispatchMode::Candidates))
            .await
            .unwrap();

        assert_eq!(
            reply.into_candidates(),
            vec!["ab".to_string(), "abcde".to_string(), "abc".to_string()]
        );
    }

    #[tokio::test]
    async fn test_error_status_keeps_code_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/prompt"))
            .respond_with(ResponseTemplate::new(503).set_body_string("no validators"))
            .mount(&mock_server)
            .await;

        let network = HttpPromptingNetwork::new(NetworkConfig::new(mock_server.uri()));
        let err = network
            .prompt(network_request(DispatchMode::Candidates))
            .await
            .unwrap_err();

        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "no validators");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_slow_network_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"completion": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&mock_server)
            .await;

        let network = HttpPromptingNetwork::new(NetworkConfig::new(mock_server.uri()));
        let mut request = network_request(DispatchMode::Best);
        request.timeout = Duration::from_millis(100);

        let err = network.prompt(request).await.unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }));
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let request = NetworkRequest {
            messages: vec![Message::new(Role::Assistant, "x")],
            timeout: Duration::from_secs(1),
            mode: DispatchMode::Candidates,
            temperature: 0.0,
            max_tokens: None,
        };
        let network = HttpPromptingNetwork::new(NetworkConfig::new("http://localhost"));
        let body = network.build_request(&request);
        assert_eq!(body["roles"], json!(["assistant"]));
        assert!(body.get("max_tokens").is_none());
    }
}

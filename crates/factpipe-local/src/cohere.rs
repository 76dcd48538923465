use crate::config::{env, env_any};
use factpipe_core::{
    Error, EvaluationRequest, EvaluationResponse, EvaluationService, Result,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;

fn cohere_api_key_from_env() -> Option<String> {
    env_any(&["FACTPIPE_COHERE_API_KEY", "COHERE_API_KEY"])
}

#[derive(Debug, Clone)]
pub struct CohereChatClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl CohereChatClient {
    pub const DEFAULT_MODEL: &'static str = "command-r-plus-08-2024";

    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            // Docs: https://docs.cohere.com/reference/chat
            endpoint: "https://api.cohere.com/v2/chat".to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = cohere_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing FACTPIPE_COHERE_API_KEY (or COHERE_API_KEY)".to_string(),
            )
        })?;
        let mut c = Self::new(client, api_key);
        if let Some(m) = env("FACTPIPE_COHERE_MODEL") {
            c.model = m;
        }
        if let Some(ep) = env("FACTPIPE_COHERE_ENDPOINT") {
            c.endpoint = ep;
        }
        Ok(c)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Text of `message.content[0].text` in a v2 chat response.
fn first_content_text(v: &serde_json::Value) -> Result<String> {
    v.pointer("/message/content/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::UpstreamShape("cohere response missing message.content[0].text".to_string())
        })
}

#[async_trait::async_trait]
impl EvaluationService for CohereChatClient {
    fn name(&self) -> &'static str {
        "cohere"
    }

    async fn evaluate(&self, req: &EvaluationRequest) -> Result<EvaluationResponse> {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            stream: false,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &req.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &req.article_text,
                },
            ],
        };

        let mut rb = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(t) = req.timeout() {
            rb = rb.timeout(t);
        }

        let resp = rb
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!("cohere chat HTTP {status}")));
        }

        let parsed: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamShape(format!("cohere response is not json: {e}")))?;
        let text = first_content_text(&parsed)?;

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("evaluate".to_string(), t0.elapsed().as_millis());
        Ok(EvaluationResponse {
            text,
            provider: "cohere".to_string(),
            timings_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{env_lock, EnvGuard};
    use serde_json::json;

    #[test]
    fn reads_first_content_block() {
        let v = json!({
            "id": "x",
            "finish_reason": "COMPLETE",
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": "[]"}, {"type": "text", "text": "ignored"}]
            }
        });
        assert_eq!(first_content_text(&v).unwrap(), "[]");
    }

    #[test]
    fn missing_content_is_an_upstream_shape_error() {
        for v in [
            json!({}),
            json!({"message": {}}),
            json!({"message": {"content": []}}),
            json!({"message": {"content": [{"type": "text"}]}}),
        ] {
            assert!(
                matches!(first_content_text(&v), Err(Error::UpstreamShape(_))),
                "{v}"
            );
        }
    }

    #[test]
    fn request_serializes_system_then_user() {
        let body = ChatRequest {
            model: "m",
            stream: false,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "usr",
                },
            ],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["stream"], false);
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "usr");
    }

    #[test]
    fn from_env_reads_model_override() {
        let _l = env_lock();
        let _k = EnvGuard::set("FACTPIPE_COHERE_API_KEY", "k");
        let _m = EnvGuard::set("FACTPIPE_COHERE_MODEL", " command-a ");
        let c = CohereChatClient::from_env(reqwest::Client::new()).unwrap();
        assert_eq!(c.model, "command-a");
    }
}

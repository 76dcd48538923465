use crate::config::env;
use factpipe_core::{
    Error, EvaluationRequest, EvaluationResponse, EvaluationService, Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

fn openai_compat_base_url_from_env() -> Option<String> {
    env("FACTPIPE_OPENAI_COMPAT_BASE_URL")
}

fn openai_compat_api_key_from_env() -> Option<String> {
    env("FACTPIPE_OPENAI_COMPAT_API_KEY")
}

fn openai_compat_model_from_env() -> Option<String> {
    env("FACTPIPE_OPENAI_COMPAT_MODEL")
}

/// Any server speaking `/v1/chat/completions` (vLLM, llama.cpp, OpenRouter, ...).
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn from_env(client: reqwest::Client, model_override: Option<String>) -> Result<Self> {
        let base_url = openai_compat_base_url_from_env().ok_or_else(|| {
            Error::NotConfigured("missing FACTPIPE_OPENAI_COMPAT_BASE_URL".to_string())
        })?;
        let api_key = openai_compat_api_key_from_env();

        let model = model_override
            .or_else(openai_compat_model_from_env)
            .ok_or_else(|| {
                Error::NotConfigured(
                    "missing model for openai_compat (set FACTPIPE_OPENAI_COMPAT_MODEL)"
                        .to_string(),
                )
            })?;

        Ok(Self::new(client, base_url, api_key, model))
    }

    fn endpoint_chat_completions(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl EvaluationService for OpenAiCompatClient {
    fn name(&self) -> &'static str {
        "openai_compat"
    }

    async fn evaluate(&self, req: &EvaluationRequest) -> Result<EvaluationResponse> {
        let t0 = Instant::now();
        let body = ChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: req.system_instruction.clone(),
                },
                Message {
                    role: "user".to_string(),
                    content: req.article_text.clone(),
                },
            ],
            // Deterministic-ish output keeps the JSON array well-formed more often.
            temperature: Some(0.0),
            stream: Some(false),
        };

        let mut rb = self
            .client
            .post(self.endpoint_chat_completions())
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(t) = req.timeout() {
            rb = rb.timeout(t);
        }
        if let Some(k) = &self.api_key {
            rb = rb.header(reqwest::header::AUTHORIZATION, format!("Bearer {k}"));
        }

        let resp = rb
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "openai_compat chat.completions HTTP {status}"
            )));
        }

        let parsed: ChatCompletionsResponse = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamShape(e.to_string()))?;
        let text = parsed.first_content()?;

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("evaluate".to_string(), t0.elapsed().as_millis());
        Ok(EvaluationResponse {
            text,
            provider: "openai_compat".to_string(),
            timings_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

impl ChatCompletionsResponse {
    fn first_content(&self) -> Result<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                Error::UpstreamShape(
                    "openai_compat response missing choices[0].message.content".to_string(),
                )
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let c = OpenAiCompatClient::new(reqwest::Client::new(), "http://x:1/", None, "m");
        assert_eq!(c.endpoint_chat_completions(), "http://x:1/v1/chat/completions");
    }

    #[test]
    fn empty_choices_is_an_upstream_shape_error() {
        let parsed: ChatCompletionsResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(parsed.first_content(), Err(Error::UpstreamShape(_))));

        let parsed: ChatCompletionsResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#)
                .unwrap();
        assert!(matches!(parsed.first_content(), Err(Error::UpstreamShape(_))));
    }

    #[test]
    fn reads_first_choice_content() {
        let parsed: ChatCompletionsResponse = serde_json::from_str(
            r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "[]"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.first_content().unwrap(), "[]");
    }
}

//! Environment-driven provider selection.
//!
//! Values are trimmed and empty values are treated as unset, so `FOO=` in a shell profile
//! never half-configures a provider.

use crate::cohere::CohereChatClient;
use crate::openai_compat::OpenAiCompatClient;
use crate::search::{BraveSearchProvider, SerpApiSearchProvider, UnconfiguredSearch};
use factpipe_core::{Error, EvaluationService, Result, SearchProvider};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

pub(crate) fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First non-empty value among `keys`, in order.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| env(k))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorKind {
    Auto,
    Cohere,
    OpenAiCompat,
}

impl FromStr for EvaluatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cohere" => Ok(Self::Cohere),
            "openai_compat" | "openai-compat" | "openai" => Ok(Self::OpenAiCompat),
            other => Err(Error::NotConfigured(format!(
                "unknown evaluator {other:?} (allowed: auto, cohere, openai_compat)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Auto,
    SerpApi,
    Brave,
    None,
}

impl FromStr for SearchKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "serpapi" | "serp" => Ok(Self::SerpApi),
            "brave" => Ok(Self::Brave),
            "none" | "off" => Ok(Self::None),
            other => Err(Error::NotConfigured(format!(
                "unknown search provider {other:?} (allowed: auto, serpapi, brave, none)"
            ))),
        }
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("factpipe/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::NotConfigured(format!("http client: {e}")))
}

/// Build the evaluation backend. `Auto` prefers Cohere, then an OpenAI-compatible endpoint.
pub fn evaluation_from_env(
    client: reqwest::Client,
    kind: EvaluatorKind,
) -> Result<Arc<dyn EvaluationService>> {
    match kind {
        EvaluatorKind::Cohere => Ok(Arc::new(CohereChatClient::from_env(client)?)),
        EvaluatorKind::OpenAiCompat => Ok(Arc::new(OpenAiCompatClient::from_env(client, None)?)),
        EvaluatorKind::Auto => {
            if let Ok(c) = CohereChatClient::from_env(client.clone()) {
                return Ok(Arc::new(c));
            }
            match OpenAiCompatClient::from_env(client, None) {
                Ok(c) => Ok(Arc::new(c)),
                Err(_) => Err(Error::NotConfigured(
                    "no evaluation backend configured (set FACTPIPE_COHERE_API_KEY or FACTPIPE_OPENAI_COMPAT_BASE_URL + FACTPIPE_OPENAI_COMPAT_MODEL)"
                        .to_string(),
                )),
            }
        }
    }
}

/// Build the search backend. `Auto` prefers SerpAPI, then Brave, and falls back to
/// [`UnconfiguredSearch`] since sources are optional.
pub fn search_from_env(client: reqwest::Client, kind: SearchKind) -> Result<Arc<dyn SearchProvider>> {
    match kind {
        SearchKind::SerpApi => Ok(Arc::new(SerpApiSearchProvider::from_env(client)?)),
        SearchKind::Brave => Ok(Arc::new(BraveSearchProvider::from_env(client)?)),
        SearchKind::None => Ok(Arc::new(UnconfiguredSearch)),
        SearchKind::Auto => {
            if let Ok(p) = SerpApiSearchProvider::from_env(client.clone()) {
                return Ok(Arc::new(p));
            }
            if let Ok(p) = BraveSearchProvider::from_env(client) {
                return Ok(Arc::new(p));
            }
            tracing::warn!("no search provider configured; claims will have no sources");
            Ok(Arc::new(UnconfiguredSearch))
        }
    }
}

/// Which providers have credentials present. Booleans only; never values.
pub fn configured_providers() -> BTreeMap<&'static str, bool> {
    let mut m = BTreeMap::new();
    m.insert(
        "cohere",
        env_any(&["FACTPIPE_COHERE_API_KEY", "COHERE_API_KEY"]).is_some(),
    );
    m.insert(
        "openai_compat",
        env("FACTPIPE_OPENAI_COMPAT_BASE_URL").is_some()
            && env("FACTPIPE_OPENAI_COMPAT_MODEL").is_some(),
    );
    m.insert(
        "serpapi",
        env_any(&["FACTPIPE_SERPAPI_API_KEY", "SERP_API_KEY"]).is_some(),
    );
    m.insert(
        "brave",
        env_any(&["FACTPIPE_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"]).is_some(),
    );
    m
}

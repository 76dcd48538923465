use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod claim;
pub mod extract;
pub mod rank;
pub mod segment;

pub use claim::{Claim, EvaluationConfig, ExtractionMode, Source, Verdict};
pub use extract::{extract_json_array, ExtractionError};
pub use segment::{CandidateStatement, Segmenter, SentenceSplitter, UnicodeSentences};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("unexpected upstream response shape: {0}")]
    UpstreamShape(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("llm failed: {0}")]
    Llm(String),
    #[error("timed out after {0}ms")]
    Timeout(u64),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl Error {
    /// Stable machine-readable code for error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Extraction(_) => "extraction_failed",
            Error::UpstreamShape(_) => "upstream_shape",
            Error::Search(_) => "search_failed",
            Error::Llm(_) => "llm_failed",
            Error::Timeout(_) => "timeout",
            Error::NotConfigured(_) => "not_configured",
        }
    }

    /// True when the caller sent something unusable; everything else is our (or upstream's) fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_))
    }

    /// Transport-level failures that may succeed on a second attempt.
    ///
    /// A malformed upstream contract will not fix itself, so `UpstreamShape` and `Extraction`
    /// are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Llm(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: Option<usize>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: None,
            language: None,
            country: None,
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub provider: String,
    pub cost_units: u64,
    pub timings_ms: BTreeMap<String, u128>,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub system_instruction: String,
    pub article_text: String,
    /// Timeout for the upstream call (network + generation).
    pub timeout_ms: Option<u64>,
}

impl EvaluationRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// Text of the first content block; expected (not guaranteed) to contain a JSON array.
    pub text: String,
    pub provider: String,
    pub timings_ms: BTreeMap<String, u128>,
}

/// A language-model backend that reviews article text and answers in free-form text.
#[async_trait::async_trait]
pub trait EvaluationService: Send + Sync {
    fn name(&self) -> &'static str;
    async fn evaluate(&self, req: &EvaluationRequest) -> Result<EvaluationResponse>;
}

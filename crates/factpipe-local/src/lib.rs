//! Networked half of factpipe: provider adapters plus the evaluator, source ranker and
//! pipeline that drive them.
//!
//! Everything here talks to backends through the `factpipe_core` traits, so tests swap in
//! canned implementations without touching the network.

pub mod cohere;
pub mod config;
pub mod evaluator;
pub mod openai_compat;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod sources;

pub use cohere::CohereChatClient;
pub use config::{
    configured_providers, evaluation_from_env, http_client, search_from_env, EvaluatorKind,
    SearchKind,
};
pub use evaluator::{ClaimEvaluator, FACT_CHECK_SYSTEM_PROMPT};
pub use openai_compat::OpenAiCompatClient;
pub use pipeline::{validate_article, Pipeline, PipelineOptions};
pub use search::{BraveSearchProvider, SerpApiSearchProvider, UnconfiguredSearch};
pub use session::{ReadingSession, SentenceRecord};
pub use sources::SourceRanker;

//! Article in, flagged claims with ranked sources out.

use crate::evaluator::ClaimEvaluator;
use crate::sources::SourceRanker;
use factpipe_core::segment::statements_to_text;
use factpipe_core::{
    Claim, Error, EvaluationConfig, EvaluationService, ExtractionMode, Result, SearchProvider,
    Segmenter,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineOptions {
    /// Send newline-joined candidate statements instead of the raw article. Statements of 30
    /// chars or fewer never reach the evaluator when this is on.
    pub segment: bool,
    pub merge_continuations: bool,
    pub extraction: ExtractionMode,
    /// Keep claims the model marked `Unverified`.
    pub keep_unverified: bool,
    pub sources: EvaluationConfig,
    /// Bound on the whole run. Exceeding it yields `Error::Timeout` and no partial results.
    pub deadline_ms: u64,
    /// Per-call timeout handed to the evaluation backend.
    pub evaluation_timeout_ms: u64,
    pub max_parallel_lookups: usize,
    /// Extra evaluation attempts, for transient errors only.
    pub evaluation_retries: u32,
    pub min_article_chars: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            segment: false,
            merge_continuations: true,
            extraction: ExtractionMode::Lenient,
            keep_unverified: false,
            sources: EvaluationConfig::default(),
            deadline_ms: 60_000,
            evaluation_timeout_ms: 45_000,
            max_parallel_lookups: 4,
            evaluation_retries: 0,
            min_article_chars: 50,
        }
    }
}

/// Reject articles shorter than `min_chars` (surrounding whitespace does not count).
pub fn validate_article(article: &str, min_chars: usize) -> Result<()> {
    let chars = article.trim().chars().count();
    if chars < min_chars {
        return Err(Error::InvalidInput(format!(
            "article must be at least {min_chars} characters (got {chars})"
        )));
    }
    Ok(())
}

pub struct Pipeline {
    evaluator: ClaimEvaluator,
    ranker: SourceRanker,
    segmenter: Segmenter,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        evaluation: Arc<dyn EvaluationService>,
        search: Arc<dyn SearchProvider>,
        options: PipelineOptions,
    ) -> Self {
        let evaluator = ClaimEvaluator::new(evaluation)
            .extraction(options.extraction)
            .keep_unverified(options.keep_unverified)
            .timeout_ms(Some(options.evaluation_timeout_ms));
        let segmenter = Segmenter::default().merge_continuations(options.merge_continuations);
        Self {
            evaluator,
            ranker: SourceRanker::new(search),
            segmenter,
            options,
        }
    }

    /// Swap the sentence segmenter (for example one with a custom splitter).
    pub fn with_segmenter(mut self, segmenter: Segmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn evaluator_name(&self) -> &'static str {
        self.evaluator.service_name()
    }

    pub fn search_name(&self) -> &'static str {
        self.ranker.provider_name()
    }

    pub async fn run(&self, article: &str) -> Result<Vec<Claim>> {
        validate_article(article, self.options.min_article_chars)?;

        let t0 = Instant::now();
        let deadline = self.options.deadline_ms;
        match tokio::time::timeout(Duration::from_millis(deadline), self.run_inner(article)).await
        {
            Ok(Ok(claims)) => {
                tracing::info!(
                    count = claims.len(),
                    sources = claims.iter().map(|c| c.sources.len()).sum::<usize>(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "fact check complete"
                );
                Ok(claims)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(deadline_ms = deadline, "fact check deadline exceeded");
                Err(Error::Timeout(deadline))
            }
        }
    }

    async fn run_inner(&self, article: &str) -> Result<Vec<Claim>> {
        let text = if self.options.segment {
            let statements = self.segmenter.segment(article);
            tracing::debug!(count = statements.len(), "article segmented");
            if statements.is_empty() {
                tracing::info!("no candidate statements; skipping evaluation");
                return Ok(Vec::new());
            }
            statements_to_text(&statements)
        } else {
            article.to_string()
        };

        let claims = self.evaluate_with_retries(&text, article).await?;
        if claims.is_empty() {
            return Ok(claims);
        }

        let config = &self.options.sources;
        let ranker = &self.ranker;
        let claims = futures_util::stream::iter(claims.into_iter().map(|mut claim| async move {
            claim.sources = ranker.find_sources(&claim.sentence, config).await;
            claim
        }))
        .buffered(self.options.max_parallel_lookups.max(1))
        .collect::<Vec<_>>()
        .await;
        Ok(claims)
    }

    async fn evaluate_with_retries(&self, text: &str, article: &str) -> Result<Vec<Claim>> {
        let mut attempt = 0u32;
        loop {
            match self.evaluator.evaluate_against(text, article).await {
                Ok(claims) => return Ok(claims),
                Err(e) if e.is_transient() && attempt < self.options.evaluation_retries => {
                    attempt += 1;
                    tracing::warn!(
                        provider = self.evaluator.service_name(),
                        attempt,
                        error = %e,
                        "evaluation failed; retrying"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        provider = self.evaluator.service_name(),
                        code = e.code(),
                        error = %e,
                        "evaluation failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}

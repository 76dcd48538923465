//! Find and rank supporting sources for a flagged claim.
//!
//! Sources are best-effort enrichment: every failure here is logged and degrades to fewer
//! (or zero) sources, never to an error for the caller.

use factpipe_core::rank::{clean_query, rank_results, Candidate, FACT_CHECK_QUERY_PREFIX};
use factpipe_core::{Error, EvaluationConfig, Result, SearchProvider, SearchQuery, Source};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct SourceRanker {
    provider: Arc<dyn SearchProvider>,
}

impl SourceRanker {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Ranked sources for `claim`, at most `config.max_sources` of them.
    ///
    /// When every query of an attempt fails, the whole lookup is retried up to
    /// `config.retry_count` more times before giving up with an empty list.
    pub async fn find_sources(&self, claim: &str, config: &EvaluationConfig) -> Vec<Source> {
        let cleaned = clean_query(claim);
        if cleaned.is_empty() || config.max_sources == 0 {
            return Vec::new();
        }

        let attempts = config.retry_count.saturating_add(1);
        for attempt in 1..=attempts {
            match self.attempt(&cleaned, config).await {
                Ok(sources) => {
                    tracing::debug!(
                        claim = %claim,
                        provider = self.provider.name(),
                        count = sources.len(),
                        attempt,
                        "sources ranked"
                    );
                    return sources;
                }
                Err(e) => {
                    tracing::warn!(
                        claim = %claim,
                        provider = self.provider.name(),
                        attempt,
                        attempts,
                        error = %e,
                        "every search query failed"
                    );
                }
            }
        }
        Vec::new()
    }

    async fn attempt(&self, cleaned: &str, config: &EvaluationConfig) -> Result<Vec<Source>> {
        let mut queries = vec![(cleaned.to_string(), false)];
        if config.include_fact_check_domain_boost {
            queries.push((format!("{FACT_CHECK_QUERY_PREFIX}{cleaned}"), true));
        }

        let outcomes = join_all(
            queries
                .iter()
                .map(|(q, fact_check)| self.run_query(q, *fact_check, config)),
        )
        .await;

        let mut candidates = Vec::new();
        let mut last_err = None;
        let mut failures = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(found) => candidates.extend(found),
                Err(e) => {
                    failures += 1;
                    last_err = Some(e);
                }
            }
        }
        if failures == queries.len() {
            return Err(last_err.unwrap_or_else(|| Error::Search("no queries issued".into())));
        }
        Ok(rank_results(cleaned, candidates, config))
    }

    async fn run_query(
        &self,
        query: &str,
        fact_check: bool,
        config: &EvaluationConfig,
    ) -> Result<Vec<Candidate>> {
        let q = SearchQuery {
            query: query.to_string(),
            max_results: Some(config.results_per_query()),
            language: Some("en".to_string()),
            country: Some("us".to_string()),
            timeout_ms: Some(config.timeout_ms),
        };
        let t0 = Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_millis(config.timeout_ms),
            self.provider.search(&q),
        )
        .await;

        match outcome {
            Ok(Ok(resp)) => {
                tracing::debug!(
                    query = %query,
                    provider = %resp.provider,
                    count = resp.results.len(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "search query done"
                );
                Ok(resp
                    .results
                    .into_iter()
                    .map(|result| Candidate {
                        result,
                        from_fact_check_query: fact_check,
                    })
                    .collect())
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    query = %query,
                    provider = self.provider.name(),
                    error = %e,
                    "search query failed"
                );
                Err(e)
            }
            Err(_) => {
                tracing::warn!(
                    query = %query,
                    provider = self.provider.name(),
                    timeout_ms = config.timeout_ms,
                    "search query timed out"
                );
                Err(Error::Timeout(config.timeout_ms))
            }
        }
    }
}

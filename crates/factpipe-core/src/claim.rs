//! Claim and source model shared by the evaluator, the ranker and the output surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    True,
    False,
    Unverified,
}

impl Verdict {
    /// Normalize an upstream verdict label ("FALSE", "false ", "True").
    ///
    /// The label is recased (first letter upper, rest lower) and anything outside the three
    /// known verdicts maps to `Unverified`.
    pub fn normalize(raw: &str) -> Verdict {
        let t = raw.trim();
        let mut chars = t.chars();
        let recased = match chars.next() {
            Some(first) => {
                let mut s: String = first.to_uppercase().collect();
                s.push_str(&chars.as_str().to_lowercase());
                s
            }
            None => String::new(),
        };
        match recased.as_str() {
            "True" => Verdict::True,
            "False" => Verdict::False,
            _ => Verdict::Unverified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "True",
            Verdict::False => "False",
            Verdict::Unverified => "Unverified",
        }
    }
}

/// Ranked evidence for a claim.
///
/// Fields are read-only: a `Source` is only produced by [`crate::rank::rank_results`], which
/// derives `domain` from `link`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    title: String,
    snippet: String,
    link: String,
    domain: String,
    relevance_score: f64,
    rank: usize,
}

impl Source {
    pub(crate) fn new(
        title: String,
        snippet: String,
        link: String,
        domain: String,
        relevance_score: f64,
        rank: usize,
    ) -> Self {
        Self {
            title,
            snippet,
            link,
            domain,
            relevance_score,
            rank,
        }
    }

    /// Hostname of `link` with a leading `www.` removed.
    pub fn domain_of(link: &str) -> Option<String> {
        let u = url::Url::parse(link.trim()).ok()?;
        let host = u.host_str()?.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        if host.is_empty() {
            return None;
        }
        Some(host.to_string())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn snippet(&self) -> &str {
        &self.snippet
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn relevance_score(&self) -> f64 {
        self.relevance_score
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub sentence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_context: Option<bool>,
    pub sources: Vec<Source>,
}

impl Claim {
    pub fn new(sentence: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            verdict: None,
            reasoning: None,
            needs_context: None,
            sources: Vec::new(),
        }
    }

    /// Build a claim from one element of an extracted JSON array.
    ///
    /// Returns `None` unless the element is an object with a non-empty string `sentence`.
    /// `reasoning` also accepts `explanation`, and `needsContext` also accepts `needs_context`.
    pub fn from_value(v: &Value) -> Option<Claim> {
        let obj = v.as_object()?;
        let sentence = obj.get("sentence")?.as_str()?.trim();
        if sentence.is_empty() {
            return None;
        }
        let verdict = obj
            .get("verdict")
            .and_then(|v| v.as_str())
            .map(Verdict::normalize);
        let reasoning = ["reasoning", "explanation"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_str()))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let needs_context = ["needsContext", "needs_context"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|v| v.as_bool()));
        Some(Claim {
            sentence: sentence.to_string(),
            verdict,
            reasoning,
            needs_context,
            sources: Vec::new(),
        })
    }

    /// Whether this claim is an inaccurate finding worth reporting.
    ///
    /// Claims without a verdict come from an evaluator that was only asked for inaccurate
    /// sentences, so they count.
    pub fn is_inaccurate(&self, keep_unverified: bool) -> bool {
        match self.verdict {
            None | Some(Verdict::False) => true,
            Some(Verdict::Unverified) => keep_unverified,
            Some(Verdict::True) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Unparseable evaluator output means "no claims" (logged).
    #[default]
    Lenient,
    /// Unparseable evaluator output is an error.
    Strict,
}

/// Per-call knobs for source lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationConfig {
    pub max_sources: usize,
    /// Issue the extra "Fact check: ..." query and boost its results.
    pub include_fact_check_domain_boost: bool,
    /// Boost results hosted on a trusted fact-checking domain.
    pub include_trusted_domains: bool,
    /// Extra attempts for the whole lookup when every query failed.
    pub retry_count: u32,
    /// Per-query timeout.
    pub timeout_ms: u64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_sources: 5,
            include_fact_check_domain_boost: true,
            include_trusted_domains: true,
            retry_count: 1,
            timeout_ms: 8_000,
        }
    }
}

impl EvaluationConfig {
    /// Raw results requested per query; extra headroom for filtering and dedup.
    pub fn results_per_query(&self) -> usize {
        self.max_sources.saturating_mul(2)
    }
}

//! Ask a language model which statements in an article are inaccurate.

use factpipe_core::{
    extract_json_array, Claim, EvaluationRequest, EvaluationService, ExtractionMode, Result,
};
use std::sync::Arc;
use std::time::Instant;

pub const FACT_CHECK_SYSTEM_PROMPT: &str = "\
You are a specialized fact-checking assistant designed to identify inaccuracies in articles.

Instructions:
1. Analyze the provided article to identify factual claims.
2. Evaluate each claim for accuracy using your knowledge.
3. Extract ONLY statements that contain inaccurate or unfactual information.
4. For each inaccurate claim, include the exact verbatim text as it appears in the article.
5. If no inaccurate claims are found, return an empty array.

Response Format:
Return ONLY a JSON array of objects, each with a \"sentence\" field holding the exact text of \
the inaccurate statement, for example:
[{\"sentence\": \"The exact text of the inaccurate statement\"}]

Do not include any explanatory text, commentary, or any content other than the JSON array.";

pub fn user_prompt(article_text: &str) -> String {
    format!(
        "Please analyze the following article for factual accuracy:\n\n\
         ARTICLE TEXT:\n{article_text}\n\n\
         Identify and extract ONLY statements containing inaccurate or misleading information. \
         Return your findings as a JSON array of inaccurate statements exactly as they appear in \
         the text. If all statements are factually accurate, return an empty array."
    )
}

pub struct ClaimEvaluator {
    service: Arc<dyn EvaluationService>,
    extraction: ExtractionMode,
    keep_unverified: bool,
    timeout_ms: Option<u64>,
}

impl ClaimEvaluator {
    pub fn new(service: Arc<dyn EvaluationService>) -> Self {
        Self {
            service,
            extraction: ExtractionMode::default(),
            keep_unverified: false,
            timeout_ms: None,
        }
    }

    pub fn extraction(mut self, mode: ExtractionMode) -> Self {
        self.extraction = mode;
        self
    }

    pub fn keep_unverified(mut self, keep: bool) -> Self {
        self.keep_unverified = keep;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    /// Evaluate `article_text` and return its inaccurate claims in response order.
    pub async fn evaluate(&self, article_text: &str) -> Result<Vec<Claim>> {
        self.evaluate_against(article_text, article_text).await
    }

    /// Evaluate `text` (for example newline-joined statements) but align claim sentences
    /// against `article`, the text the caller will highlight.
    pub async fn evaluate_against(&self, text: &str, article: &str) -> Result<Vec<Claim>> {
        let t0 = Instant::now();
        let req = EvaluationRequest {
            system_instruction: FACT_CHECK_SYSTEM_PROMPT.to_string(),
            article_text: user_prompt(text),
            timeout_ms: self.timeout_ms,
        };
        let resp = self.service.evaluate(&req).await?;
        tracing::debug!(
            provider = %resp.provider,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            response_chars = resp.text.chars().count(),
            "evaluation response received"
        );

        let items = match extract_json_array(&resp.text) {
            Ok(items) => items,
            Err(e) => match self.extraction {
                ExtractionMode::Strict => return Err(e.into()),
                ExtractionMode::Lenient => {
                    tracing::warn!(
                        provider = %resp.provider,
                        error = %e,
                        response_preview = %preview(&resp.text, 200),
                        "could not extract claims from evaluation response; treating as none"
                    );
                    return Ok(Vec::new());
                }
            },
        };

        let mut claims = Vec::with_capacity(items.len());
        for item in &items {
            let Some(mut claim) = Claim::from_value(item) else {
                tracing::debug!(item = %item, "dropping evaluation item without a sentence");
                continue;
            };
            if !claim.is_inaccurate(self.keep_unverified) {
                tracing::debug!(
                    claim = %claim.sentence,
                    verdict = ?claim.verdict,
                    "dropping claim not judged inaccurate"
                );
                continue;
            }
            match align_to_article(&claim.sentence, article) {
                Some(aligned) => claim.sentence = aligned,
                None => tracing::warn!(
                    claim = %claim.sentence,
                    "claim sentence not found in article text"
                ),
            }
            claims.push(claim);
        }

        tracing::info!(
            provider = %resp.provider,
            count = claims.len(),
            extracted = items.len(),
            "evaluation complete"
        );
        Ok(claims)
    }
}

/// The article's own span for `sentence`.
///
/// Exact substrings are returned as-is. Otherwise whitespace runs, letter case and curly
/// quotes are normalized on both sides and the matching original span is returned.
pub fn align_to_article(sentence: &str, article: &str) -> Option<String> {
    let sentence = sentence.trim();
    if sentence.is_empty() {
        return None;
    }
    if article.contains(sentence) {
        return Some(sentence.to_string());
    }

    let hay = normalize_with_spans(article);
    let needle: Vec<char> = normalize_with_spans(sentence)
        .into_iter()
        .map(|(c, _, _)| c)
        .collect();
    if needle.is_empty() || needle.len() > hay.len() {
        return None;
    }
    let pos = hay
        .windows(needle.len())
        .position(|w| w.iter().map(|(c, _, _)| *c).eq(needle.iter().copied()))?;
    let start = hay[pos].1;
    let end = hay[pos + needle.len() - 1].2;
    Some(article[start..end].to_string())
}

/// Normalized chars, each paired with the byte range of the original char it came from.
fn normalize_with_spans(s: &str) -> Vec<(char, usize, usize)> {
    let mut out: Vec<(char, usize, usize)> = Vec::with_capacity(s.len());
    let mut pending_space: Option<(usize, usize)> = None;
    for (i, ch) in s.char_indices() {
        let end = i + ch.len_utf8();
        if ch.is_whitespace() {
            pending_space.get_or_insert((i, end)).1 = end;
            continue;
        }
        if let Some((a, b)) = pending_space.take() {
            if !out.is_empty() {
                out.push((' ', a, b));
            }
        }
        let folded = match ch {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201c}' | '\u{201d}' => '"',
            _ => ch,
        };
        for lc in folded.to_lowercase() {
            out.push((lc, i, end));
        }
    }
    out
}

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push('…');
    }
    out
}

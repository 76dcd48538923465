//! Relevance scoring for search results gathered as evidence for a claim.

use crate::claim::{EvaluationConfig, Source};
use crate::SearchResult;
use std::collections::HashMap;

/// Prefix of the second, fact-check oriented query.
pub const FACT_CHECK_QUERY_PREFIX: &str = "Fact check: ";

/// Fact-checking outlets. Entries with a path only match links under that path.
pub const TRUSTED_FACT_CHECK_DOMAINS: &[&str] = &[
    "factcheck.org",
    "politifact.com",
    "snopes.com",
    "reuters.com/fact-check",
    "apnews.com/hub/fact-checking",
    "bbc.com/news/reality_check",
    "fullfact.org",
    "factcheck.afp.com",
    "usatoday.com/fact-check",
    "washingtonpost.com/fact-checker",
];

pub const FACT_CHECK_TERMS: &[&str] = &[
    "fact check",
    "fact-check",
    "debunk",
    "verify",
    "false",
    "true",
];

const TRUSTED_DOMAIN_BOOST: f64 = 10.0;
const FACT_CHECK_QUERY_BOOST: f64 = 5.0;
const KEYWORD_TITLE: f64 = 1.0;
const KEYWORD_SNIPPET: f64 = 0.5;
const TERM_TITLE: f64 = 2.0;
const TERM_SNIPPET: f64 = 1.0;

/// A raw search hit plus the query that found it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub result: SearchResult,
    pub from_fact_check_query: bool,
}

/// Turn a claim into a search query: punctuation becomes whitespace, whitespace collapses.
pub fn clean_query(claim: &str) -> String {
    let replaced: String = claim
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased query words longer than three characters.
pub fn keywords(cleaned: &str) -> Vec<String> {
    cleaned
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

pub fn is_trusted_domain(link: &str) -> bool {
    let Ok(u) = url::Url::parse(link.trim()) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let path = u.path();
    TRUSTED_FACT_CHECK_DOMAINS.iter().any(|entry| {
        let (entry_host, entry_path) = match entry.find('/') {
            Some(i) => (&entry[..i], &entry[i..]),
            None => (*entry, ""),
        };
        let host_ok = host == entry_host
            || host
                .strip_suffix(entry_host)
                .is_some_and(|rest| rest.ends_with('.'));
        host_ok && path.starts_with(entry_path)
    })
}

pub fn score(c: &Candidate, keywords: &[String], config: &EvaluationConfig) -> f64 {
    let title = c.result.title.as_deref().unwrap_or("").to_lowercase();
    let snippet = c.result.snippet.as_deref().unwrap_or("").to_lowercase();

    let mut s = 0.0;
    if config.include_trusted_domains && is_trusted_domain(&c.result.url) {
        s += TRUSTED_DOMAIN_BOOST;
    }
    if c.from_fact_check_query {
        s += FACT_CHECK_QUERY_BOOST;
    }
    for k in keywords {
        if title.contains(k.as_str()) {
            s += KEYWORD_TITLE;
        }
        if snippet.contains(k.as_str()) {
            s += KEYWORD_SNIPPET;
        }
    }
    for term in FACT_CHECK_TERMS {
        if title.contains(term) {
            s += TERM_TITLE;
        }
        if snippet.contains(term) {
            s += TERM_SNIPPET;
        }
    }
    s
}

fn dedup_key(link: &str) -> Option<String> {
    let mut u = url::Url::parse(link.trim()).ok()?;
    u.set_fragment(None);
    Some(u.as_str().trim_end_matches('/').to_string())
}

/// Filter, deduplicate, score and rank candidates (in discovery order) for one claim.
///
/// Candidates without a title, without a link, or whose link has no host are dropped.
/// Duplicate links keep their first position; a duplicate that was also found by the
/// fact-check query passes that flag on. Ties keep discovery order.
pub fn rank_results(
    cleaned_claim: &str,
    candidates: Vec<Candidate>,
    config: &EvaluationConfig,
) -> Vec<Source> {
    let kws = keywords(cleaned_claim);

    let mut kept: Vec<(Candidate, String)> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for c in candidates {
        let has_title = c
            .result
            .title
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty());
        if !has_title || c.result.url.trim().is_empty() {
            continue;
        }
        let (Some(key), Some(domain)) = (dedup_key(&c.result.url), Source::domain_of(&c.result.url))
        else {
            continue;
        };
        if let Some(&i) = seen.get(&key) {
            kept[i].0.from_fact_check_query |= c.from_fact_check_query;
            continue;
        }
        seen.insert(key, kept.len());
        kept.push((c, domain));
    }

    let mut scored: Vec<(f64, Candidate, String)> = kept
        .into_iter()
        .map(|(c, domain)| (score(&c, &kws, config), c, domain))
        .collect();
    // `sort_by` is stable, so equal scores stay in discovery order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(config.max_sources);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (s, c, domain))| {
            Source::new(
                c.result.title.unwrap_or_default().trim().to_string(),
                c.result.snippet.unwrap_or_default().trim().to_string(),
                c.result.url.trim().to_string(),
                domain,
                s,
                i + 1,
            )
        })
        .collect()
}

use crate::config::{env, env_any};
use factpipe_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    q.timeout_ms.unwrap_or(8_000).clamp(500, 60_000)
}

fn serpapi_api_key_from_env() -> Option<String> {
    env_any(&["FACTPIPE_SERPAPI_API_KEY", "SERP_API_KEY"])
}

fn brave_api_key_from_env() -> Option<String> {
    env_any(&["FACTPIPE_BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

#[derive(Debug, Clone)]
pub struct SerpApiSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

/// Stand-in used when no search backend is configured.
///
/// Every query fails with `NotConfigured`, which the source ranker turns into an empty
/// source list, so claims are still reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredSearch;

impl SerpApiSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: "https://serpapi.com/search.json".to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serpapi_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing FACTPIPE_SERPAPI_API_KEY (or SERP_API_KEY)".to_string())
        })?;
        let mut p = Self::new(client, api_key);
        if let Some(ep) = env("FACTPIPE_SERPAPI_ENDPOINT") {
            p.endpoint = ep;
        }
        Ok(p)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl BraveSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            // Docs: https://api.search.brave.com/res/v1/web/search
            endpoint: "https://api.search.brave.com/res/v1/web/search".to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured(
                "missing FACTPIPE_BRAVE_API_KEY (or BRAVE_SEARCH_API_KEY)".to_string(),
            )
        })?;
        let mut p = Self::new(client, api_key);
        if let Some(ep) = env("FACTPIPE_BRAVE_ENDPOINT") {
            p.endpoint = ep;
        }
        Ok(p)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Option<Vec<SerpApiOrganicResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerpApiOrganicResult {
    link: Option<String>,
    title: Option<String>,
    snippet: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerpApiSearchProvider {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self.client.get(&self.endpoint).query(&[
            ("q", q.query.as_str()),
            ("api_key", self.api_key.as_str()),
        ]);
        if let Some(n) = q.max_results {
            req = req.query(&[("num", n.to_string())]);
        }
        // Pin locale for consistent results unless the caller asks otherwise.
        req = req.query(&[
            ("hl", q.language.as_deref().unwrap_or("en")),
            ("gl", q.country.as_deref().unwrap_or("us")),
        ]);

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serpapi search HTTP {status}")));
        }

        let parsed: SerpApiResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        if let Some(err) = parsed.error {
            return Err(Error::Search(format!("serpapi: {err}")));
        }

        let mut out = Vec::new();
        for r in parsed.organic_results.unwrap_or_default() {
            let Some(url) = r.link else { continue };
            out.push(SearchResult {
                url,
                title: r.title,
                snippet: r.snippet,
                source: "serpapi".to_string(),
            });
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results: out,
            provider: "serpapi".to_string(),
            cost_units: 1,
            timings_ms,
        })
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
    description: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", q.query.as_str())]);

        if let Some(n) = q.max_results {
            // Brave caps `count` at 20.
            req = req.query(&[("count", n.min(20).to_string())]);
        }
        if let Some(lang) = q.language.as_deref() {
            req = req.query(&[("search_lang", lang)]);
        }
        if let Some(country) = q.country.as_deref() {
            req = req.query(&[("country", country)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let mut out = Vec::new();
        if let Some(results) = parsed.web.and_then(|w| w.results) {
            for r in results {
                out.push(SearchResult {
                    url: r.url,
                    title: r.title,
                    snippet: r.description,
                    source: "brave".to_string(),
                });
            }
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results: out,
            provider: "brave".to_string(),
            cost_units: 1,
            timings_ms,
        })
    }
}

#[async_trait::async_trait]
impl SearchProvider for UnconfiguredSearch {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn search(&self, _q: &SearchQuery) -> Result<SearchResponse> {
        Err(Error::NotConfigured(
            "no search provider configured (set FACTPIPE_SERPAPI_API_KEY or FACTPIPE_BRAVE_API_KEY)"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::{env_lock, EnvGuard};

    #[test]
    fn empty_api_keys_are_treated_as_missing() {
        let _l = env_lock();
        let _g1 = EnvGuard::set("FACTPIPE_SERPAPI_API_KEY", "");
        let _g2 = EnvGuard::set("SERP_API_KEY", "   ");
        let _g3 = EnvGuard::set("FACTPIPE_BRAVE_API_KEY", "  ");
        let _g4 = EnvGuard::remove("BRAVE_SEARCH_API_KEY");
        assert!(serpapi_api_key_from_env().is_none());
        assert!(brave_api_key_from_env().is_none());
        assert!(matches!(
            SerpApiSearchProvider::from_env(reqwest::Client::new()),
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn legacy_key_names_are_accepted() {
        let _l = env_lock();
        let _g1 = EnvGuard::remove("FACTPIPE_SERPAPI_API_KEY");
        let _g2 = EnvGuard::set("SERP_API_KEY", "k");
        assert_eq!(serpapi_api_key_from_env().as_deref(), Some("k"));
    }

    #[test]
    fn parses_minimal_serpapi_shape() {
        let js = r#"
        {
          "search_metadata": {"status": "Success"},
          "organic_results": [
            {"position": 1, "title": "Example", "link": "https://example.com", "snippet": "Hello"},
            {"position": 2, "title": "No link"}
          ]
        }
        "#;
        let parsed: SerpApiResponse = serde_json::from_str(js).unwrap();
        let rs = parsed.organic_results.unwrap();
        assert_eq!(rs.len(), 2);
        assert_eq!(rs[0].link.as_deref(), Some("https://example.com"));
        assert_eq!(rs[0].snippet.as_deref(), Some("Hello"));
        assert!(rs[1].link.is_none());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn parses_serpapi_error_shape() {
        let parsed: SerpApiResponse =
            serde_json::from_str(r#"{"error": "Invalid API key."}"#).unwrap();
        assert!(parsed.organic_results.is_none());
        assert_eq!(parsed.error.as_deref(), Some("Invalid API key."));
    }

    #[test]
    fn parses_minimal_brave_shape() {
        let js = r#"
        {
          "web": {
            "results": [
              {"url":"https://example.com","title":"Example","description":"Hello"}
            ]
          }
        }
        "#;
        let parsed: BraveWebSearchResponse = serde_json::from_str(js).unwrap();
        let rs = parsed.web.unwrap().results.unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].url, "https://example.com");
        assert_eq!(rs[0].description.as_deref(), Some("Hello"));
    }

    #[test]
    fn query_timeout_is_clamped() {
        let mut q = SearchQuery::new("x");
        assert_eq!(timeout_ms_from_query(&q), 8_000);
        q.timeout_ms = Some(1);
        assert_eq!(timeout_ms_from_query(&q), 500);
        q.timeout_ms = Some(10_000_000);
        assert_eq!(timeout_ms_from_query(&q), 60_000);
    }

    #[tokio::test]
    async fn unconfigured_search_always_fails() {
        let err = UnconfiguredSearch
            .search(&SearchQuery::new("anything"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }
}

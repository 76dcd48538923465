use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use factpipe_core::{
    Error, EvaluationRequest, EvaluationService, SearchProvider, SearchQuery,
};
use factpipe_local::{
    BraveSearchProvider, CohereChatClient, OpenAiCompatClient, Pipeline, PipelineOptions,
    SerpApiSearchProvider,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn eval_request(article: &str) -> EvaluationRequest {
    EvaluationRequest {
        system_instruction: "system".to_string(),
        article_text: article.to_string(),
        timeout_ms: Some(5_000),
    }
}

fn cohere_reply(text: &str) -> Value {
    json!({
        "id": "stub",
        "finish_reason": "COMPLETE",
        "message": {"role": "assistant", "content": [{"type": "text", "text": text}]}
    })
}

#[tokio::test]
async fn cohere_sends_bearer_auth_and_reads_first_text_block() {
    let seen: Arc<Mutex<Option<(Option<String>, Value)>>> = Arc::new(Mutex::new(None));
    let app = Router::new().route(
        "/v2/chat",
        post({
            let seen = seen.clone();
            move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *seen.lock().unwrap() = Some((auth, body));
                    Json(cohere_reply("[]"))
                }
            }
        }),
    );
    let addr = serve(app).await;

    let c = CohereChatClient::new(reqwest::Client::new(), "test-key")
        .with_endpoint(format!("http://{addr}/v2/chat"))
        .with_model("command-test");
    let resp = c.evaluate(&eval_request("ARTICLE BODY")).await.unwrap();
    assert_eq!(resp.text, "[]");
    assert_eq!(resp.provider, "cohere");

    let (auth, body) = seen.lock().unwrap().take().unwrap();
    assert_eq!(auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(body["model"], "command-test");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "ARTICLE BODY");
}

#[tokio::test]
async fn cohere_http_error_is_an_llm_error() {
    let app = Router::new().route(
        "/v2/chat",
        post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let addr = serve(app).await;
    let c = CohereChatClient::new(reqwest::Client::new(), "k")
        .with_endpoint(format!("http://{addr}/v2/chat"));
    let err = c.evaluate(&eval_request("x")).await.unwrap_err();
    assert!(matches!(err, Error::Llm(_)), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn cohere_unexpected_shape_is_an_upstream_shape_error() {
    let app = Router::new().route(
        "/v2/chat",
        post(|| async { Json(json!({"message": {"content": []}})) }),
    );
    let addr = serve(app).await;
    let c = CohereChatClient::new(reqwest::Client::new(), "k")
        .with_endpoint(format!("http://{addr}/v2/chat"));
    let err = c.evaluate(&eval_request("x")).await.unwrap_err();
    assert!(matches!(err, Error::UpstreamShape(_)), "{err:?}");
    assert!(!err.is_transient());
}

#[tokio::test]
async fn openai_compat_reads_first_choice() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["temperature"], 0.0);
            Json(json!({
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "[{\"sentence\": \"x\"}]"}}]
            }))
        }),
    );
    let addr = serve(app).await;
    let c = OpenAiCompatClient::new(
        reqwest::Client::new(),
        format!("http://{addr}/"),
        None,
        "local-model",
    );
    let resp = c.evaluate(&eval_request("x")).await.unwrap();
    assert_eq!(resp.text, r#"[{"sentence": "x"}]"#);
}

#[tokio::test]
async fn serpapi_sends_locale_and_count_and_maps_organic_results() {
    let seen: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
    let app = Router::new().route(
        "/search.json",
        get({
            let seen = seen.clone();
            move |Query(params): Query<HashMap<String, String>>| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = params;
                    Json(json!({
                        "organic_results": [
                            {"position": 1, "title": "One", "link": "https://one.example/", "snippet": "first"},
                            {"position": 2, "title": "No link"},
                            {"position": 3, "title": "Two", "link": "https://two.example/"}
                        ]
                    }))
                }
            }
        }),
    );
    let addr = serve(app).await;
    let p = SerpApiSearchProvider::new(reqwest::Client::new(), "serp-key")
        .with_endpoint(format!("http://{addr}/search.json"));

    let mut q = SearchQuery::new("moon cheese");
    q.max_results = Some(10);
    let resp = p.search(&q).await.unwrap();
    assert_eq!(resp.results.len(), 2);
    assert_eq!(resp.results[0].url, "https://one.example/");
    assert_eq!(resp.results[0].snippet.as_deref(), Some("first"));
    assert!(resp.results[1].snippet.is_none());

    let params = seen.lock().unwrap().clone();
    assert_eq!(params.get("q").map(String::as_str), Some("moon cheese"));
    assert_eq!(params.get("api_key").map(String::as_str), Some("serp-key"));
    assert_eq!(params.get("num").map(String::as_str), Some("10"));
    assert_eq!(params.get("hl").map(String::as_str), Some("en"));
    assert_eq!(params.get("gl").map(String::as_str), Some("us"));
}

#[tokio::test]
async fn serpapi_http_status_and_error_field_are_search_errors() {
    let app = Router::new()
        .route(
            "/down",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        )
        .route(
            "/bad-key",
            get(|| async { Json(json!({"error": "Invalid API key."})) }),
        );
    let addr = serve(app).await;

    for path in ["down", "bad-key"] {
        let p = SerpApiSearchProvider::new(reqwest::Client::new(), "k")
            .with_endpoint(format!("http://{addr}/{path}"));
        let err = p.search(&SearchQuery::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::Search(_)), "{path}: {err:?}");
    }
}

#[tokio::test]
async fn brave_sends_subscription_token() {
    let app = Router::new().route(
        "/res/v1/web/search",
        get(|headers: HeaderMap| async move {
            let token = headers
                .get("x-subscription-token")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if token != "brave-key" {
                return (StatusCode::UNAUTHORIZED, Json(json!({})));
            }
            (
                StatusCode::OK,
                Json(json!({"web": {"results": [
                    {"url": "https://b.example/", "title": "B", "description": "desc"}
                ]}})),
            )
        }),
    );
    let addr = serve(app).await;
    let p = BraveSearchProvider::new(reqwest::Client::new(), "brave-key")
        .with_endpoint(format!("http://{addr}/res/v1/web/search"));
    let resp = p.search(&SearchQuery::new("x")).await.unwrap();
    assert_eq!(resp.results.len(), 1);
    assert_eq!(resp.results[0].snippet.as_deref(), Some("desc"));
}

#[tokio::test]
async fn pipeline_over_http_stubs_ranks_fact_checkers_first() {
    let claim = "The moon is made of cheese, according to several local farmers.";
    let article = format!("{claim} Water boils at 100 degrees Celsius at sea level.");
    let reply = json!([{ "sentence": claim }]).to_string();

    let app = Router::new()
        .route(
            "/v2/chat",
            post(move || {
                let reply = reply.clone();
                async move { Json(cohere_reply(&format!("```json\n{reply}\n```"))) }
            }),
        )
        .route(
            "/search.json",
            get(|| async {
                Json(json!({"organic_results": [
                    {"title": "Cheese moon theory", "link": "https://blog.example.com/moon", "snippet": "moon cheese"},
                    {"title": "Is the moon made of cheese?", "link": "https://www.politifact.com/factchecks/moon/", "snippet": "No."}
                ]}))
            }),
        );
    let addr = serve(app).await;

    let client = reqwest::Client::new();
    let eval = CohereChatClient::new(client.clone(), "k")
        .with_endpoint(format!("http://{addr}/v2/chat"));
    let search = SerpApiSearchProvider::new(client, "k")
        .with_endpoint(format!("http://{addr}/search.json"));
    let p = Pipeline::new(Arc::new(eval), Arc::new(search), PipelineOptions::default());

    let claims = p.run(&article).await.unwrap();
    assert_eq!(claims.len(), 1);
    assert_eq!(claims[0].sentence, claim);
    assert_eq!(claims[0].sources[0].domain(), "politifact.com");
    assert_eq!(claims[0].sources[1].domain(), "blog.example.com");
}

//! HTTP API tests: the router is served on a free port and driven with
//! `reqwest`; the completion API is a `wiremock` server.

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use startup_radar::config::{Config, IdentityMode};
use startup_radar::db;
use startup_radar::fetch::{CompletionClient, Fetcher};
use startup_radar::merge::MergeEngine;
use startup_radar::migrate;
use startup_radar::pipeline::Pipeline;
use startup_radar::server::{router, AppState};
use startup_radar::store::{SqliteStore, Store};

const HEADER: &str = "Nome da Startup; Site; Setor; Ano de Fundação; Valor do Investimento (em reais); Rodada; Data do Investimento; VC Investidor; Descrição Breve; LinkedIn do Fundador; Localização (país)";

struct TestServer {
    _tmp: TempDir,
    base: String,
    upstream: MockServer,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base, route)
    }

    async fn post(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/entities"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, route: &str) -> reqwest::Response {
        self.client.get(self.url(route)).send().await.unwrap()
    }
}

/// Starts the app with an upstream that fails every request unless a test
/// mounts a reply first.
async fn start() -> TestServer {
    let upstream = MockServer::start().await;
    let tmp = TempDir::new().unwrap();

    let mut config = Config::with_db_path(tmp.path().join("radar.sqlite"));
    config.upstream.base_url = upstream.uri();
    config.upstream.api_key = Some("test-key".to_string());
    config.upstream.timeout_secs = 5;
    config.server.page_limit = 2;

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let fetcher: Arc<dyn Fetcher> = Arc::new(CompletionClient::new(&config.upstream).unwrap());
    let engine = Arc::new(MergeEngine::new(store.clone(), IdentityMode::Exact));
    let pipeline = Arc::new(Pipeline::new(fetcher, engine));

    let app = router(
        AppState::new(pipeline, store, config.server.page_limit),
        &config.server,
    )
    .unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        _tmp: tmp,
        base: format!("http://{}", addr),
        upstream,
        client: reqwest::Client::new(),
    }
}

async fn mount_table(server: &MockServer, subject: &str, rows: &[&str]) {
    let mut content = HEADER.to_string();
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(subject))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_health() {
    let server = start().await;
    let resp = server.get("/health").await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_create_falls_back_to_submission() {
    let server = start().await;
    let resp = server
        .post(json!({
            "name": "Acme",
            "sector": "Fintech",
            "founding_year": 2018,
            "investment_date": "15/06/2021"
        }))
        .await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert!(body.is_object());
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["sector"], "Fintech");
    assert_eq!(body["founding_year"], 2018);
    assert_eq!(body["investment_date"], "2021-06-15");
    assert_eq!(body["investor_name"], "Desconhecido");
    assert!(body["id"].is_i64());
    assert!(body["updated_at"].is_string());
}

#[tokio::test]
async fn test_create_returns_enriched_list() {
    let server = start().await;
    mount_table(
        &server.upstream,
        "Acme",
        &[
            "Acme; acme.io; Fintech; 2018; 5.000.000; Seed; 2021-06-15; Kaszek; desc; li.nk; Brasil",
            "Acme Health; ; Healthtech; ; ; ; ; ; ; ; México",
        ],
    )
    .await;

    let resp = server.post(json!({ "name": "Acme" })).await;
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["website"], "acme.io");
    assert_eq!(list[0]["investor_name"], "Kaszek");
    assert_eq!(list[1]["name"], "Acme Health");
    assert_eq!(list[1]["investor_name"], "Desconhecido");
    assert_eq!(list[1]["location"], "México");
}

#[tokio::test]
async fn test_create_merges_into_existing() {
    let server = start().await;
    server
        .post(json!({ "name": "Acme", "sector": "Fintech", "website": "acme.io" }))
        .await;
    let body: Value = server
        .post(json!({ "name": "Acme", "website": "acme.com", "sector": "" }))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["website"], "acme.com");
    assert_eq!(body["sector"], "Fintech");

    let all: Value = server.get("/entities").await.json().await.unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_requires_name() {
    let server = start().await;
    for body in [json!({ "sector": "Fintech" }), json!({ "name": "   " })] {
        let resp = server.post(body).await;
        assert_eq!(resp.status(), 400);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "bad_request");
        assert!(err["error"]["message"].is_string());
    }
}

#[tokio::test]
async fn test_list_paginates_by_id() {
    let server = start().await;
    for name in ["One", "Two", "Three"] {
        server.post(json!({ "name": name })).await;
    }

    let default_page: Value = server.get("/entities").await.json().await.unwrap();
    let names: Vec<_> = default_page
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["One", "Two"]);

    let page: Value = server
        .get("/entities?skip=1&limit=1")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["name"], "Two");

    let past_end: Value = server.get("/entities?skip=10").await.json().await.unwrap();
    assert!(past_end.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_list_rejects_bad_paging() {
    let server = start().await;
    for route in ["/entities?skip=-1", "/entities?limit=-5", "/entities?limit=ten"] {
        let resp = server.get(route).await;
        assert_eq!(resp.status(), 400, "{}", route);
        let err: Value = resp.json().await.unwrap();
        assert_eq!(err["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_get_by_id() {
    let server = start().await;
    let created: Value = server
        .post(json!({ "name": "Acme" }))
        .await
        .json()
        .await
        .unwrap();
    let id = created["id"].as_i64().unwrap();

    let resp = server.get(&format!("/entities/{}", id)).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "Acme");

    let missing = server.get("/entities/9999").await;
    assert_eq!(missing.status(), 404);
    let err: Value = missing.json().await.unwrap();
    assert_eq!(err["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_cors_allows_configured_origin_only() {
    let server = start().await;

    let allowed = server
        .client
        .get(server.url("/entities"))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();
    assert_eq!(
        allowed
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );

    let denied = server
        .client
        .get(server.url("/entities"))
        .header("Origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(denied.headers().get("access-control-allow-origin").is_none());
}

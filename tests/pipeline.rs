//! End-to-end ingestion against a mocked completion API and a real SQLite
//! database in a temp directory.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use startup_radar::config::{Config, IdentityMode};
use startup_radar::db;
use startup_radar::fetch::{CompletionClient, Fetcher};
use startup_radar::merge::MergeEngine;
use startup_radar::migrate;
use startup_radar::models::StartupRecord;
use startup_radar::pipeline::{Pipeline, SubjectState};
use startup_radar::store::{SqliteStore, Store};

const HEADER: &str = "Nome da Startup; Site; Setor; Ano de Fundação; Valor do Investimento (em reais); Rodada; Data do Investimento; VC Investidor; Descrição Breve; LinkedIn do Fundador; Localização (país)";

struct Harness {
    _tmp: TempDir,
    pool: SqlitePool,
    store: Arc<SqliteStore>,
    pipeline: Pipeline,
}

async fn harness(server: &MockServer, timeout_secs: u64) -> Harness {
    let tmp = TempDir::new().unwrap();
    let mut config = Config::with_db_path(tmp.path().join("data/radar.sqlite"));
    config.upstream.base_url = server.uri();
    config.upstream.api_key = Some("test-key".to_string());
    config.upstream.timeout_secs = timeout_secs;

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let fetcher: Arc<dyn Fetcher> = Arc::new(CompletionClient::new(&config.upstream).unwrap());
    let engine = Arc::new(MergeEngine::new(store.clone(), IdentityMode::Exact));

    Harness {
        _tmp: tmp,
        pool,
        store,
        pipeline: Pipeline::new(fetcher, engine),
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "cmpl-1",
        "model": "sonar-pro",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

fn table(rows: &[&str]) -> String {
    let mut out = HEADER.to_string();
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out
}

fn subjects(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

async fn mount_reply(server: &MockServer, subject: &str, content: &str) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains(subject))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_single_row_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&table(&[
            "Acme; acme.io; Fintech; 2018; 5.000.000; Seed; 2021-06-15; [VC1, VC2]; desc; li.nk; Brasil",
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, 5).await;
    let merged = h.pipeline.run(&subjects(&["VC1"])).await;
    assert_eq!(merged, 1);

    let rows = h.store.list(0, 10).await.unwrap();
    assert_eq!(rows.len(), 1);
    let acme = &rows[0].fields;
    assert_eq!(
        acme,
        &StartupRecord {
            name: "Acme".into(),
            website: Some("acme.io".into()),
            sector: Some("Fintech".into()),
            founding_year: Some(2018),
            investment_amount: Some("5.000.000".into()),
            round_label: Some("Seed".into()),
            investment_date: NaiveDate::from_ymd_opt(2021, 6, 15),
            investor_name: Some("VC1, VC2".into()),
            short_description: Some("desc".into()),
            founder_contact: Some("li.nk".into()),
            location: Some("Brasil".into()),
        }
    );
    h.pool.close().await;
}

#[tokio::test]
async fn test_fenced_payload_is_unwrapped() {
    let server = MockServer::start().await;
    let fenced = format!(
        "```csv\n{}\n```",
        table(&["Acme; acme.io; Fintech; 2018; 1.000; Seed; 2021-06; Kaszek; desc; li.nk; Brasil"])
    );
    mount_reply(&server, "Kaszek", &fenced).await;

    let h = harness(&server, 5).await;
    assert_eq!(h.pipeline.run(&subjects(&["Kaszek"])).await, 1);

    let rows = h.store.list(0, 10).await.unwrap();
    assert_eq!(rows[0].fields.investment_date, NaiveDate::from_ymd_opt(2021, 6, 1));
    h.pool.close().await;
}

#[tokio::test]
async fn test_upstream_error_yields_zero_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let h = harness(&server, 5).await;
    let report = h.pipeline.run_report(&subjects(&["VC1"])).await;

    assert_eq!(report.merged, 0);
    assert_eq!(report.subjects, vec![("VC1".to_string(), SubjectState::Skipped)]);
    assert!(h.store.list(0, 10).await.unwrap().is_empty());
    h.pool.close().await;
}

#[tokio::test]
async fn test_timeout_is_treated_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(&table(&["Late; ; ; ; ; ; ; ; ; ; "])))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let h = harness(&server, 1).await;
    assert_eq!(h.pipeline.run(&subjects(&["VC1"])).await, 0);
    h.pool.close().await;
}

#[tokio::test]
async fn test_envelope_without_content_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let h = harness(&server, 5).await;
    assert_eq!(h.pipeline.run(&subjects(&["VC1"])).await, 0);
    h.pool.close().await;
}

#[tokio::test]
async fn test_subjects_merge_in_list_order_and_survive_failures() {
    let server = MockServer::start().await;
    mount_reply(&server, "Monashees", &table(&["Beta; ; ; ; ; ; ; ; ; ; "])).await;
    mount_reply(
        &server,
        "Kaszek",
        &table(&["Alpha; ; ; ; ; ; ; ; ; ; ", "Gamma; ; Edtech; ; ; ; ; ; ; ; "]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Bossanova"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(&server, 5).await;
    let merged = h
        .pipeline
        .run(&subjects(&["Kaszek", "Bossanova", "Monashees"]))
        .await;
    assert_eq!(merged, 3);

    let rows = h.store.list(0, 10).await.unwrap();
    let names: Vec<_> = rows.iter().map(|s| s.fields.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Gamma", "Beta"]);
    assert_eq!(rows[0].fields.investor_name.as_deref(), Some("Kaszek"));
    assert_eq!(rows[2].fields.investor_name.as_deref(), Some("Monashees"));
    h.pool.close().await;
}

#[tokio::test]
async fn test_rerun_updates_in_place() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        "Kaszek",
        &table(&["Acme; acme.io; Fintech; 2018; ; ; ; Kaszek; ; ; Brasil"]),
    )
    .await;

    let h = harness(&server, 5).await;
    h.pipeline.run(&subjects(&["Kaszek"])).await;
    let first = h.store.list(0, 10).await.unwrap();
    h.pipeline.run(&subjects(&["Kaszek"])).await;
    let second = h.store.list(0, 10).await.unwrap();

    assert_eq!(second.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].fields, second[0].fields);
    assert!(second[0].updated_at > first[0].updated_at);
    h.pool.close().await;
}

#[tokio::test]
async fn test_absent_cells_keep_stored_values() {
    let server = MockServer::start().await;
    let h = harness(&server, 5).await;

    mount_reply(
        &server,
        "Kaszek",
        &table(&["Acme; acme.io; Fintech; 2018; ; ; ; Kaszek; ; ; Brasil"]),
    )
    .await;
    h.pipeline.run(&subjects(&["Kaszek"])).await;

    server.reset().await;
    mount_reply(
        &server,
        "Kaszek",
        &table(&["Acme; acme.com; ; not-a-year; ; ; ; Kaszek; ; ; "]),
    )
    .await;
    h.pipeline.run(&subjects(&["Kaszek"])).await;

    let acme = h.store.list(0, 10).await.unwrap().remove(0);
    assert_eq!(acme.fields.website.as_deref(), Some("acme.com"));
    assert_eq!(acme.fields.sector.as_deref(), Some("Fintech"));
    assert_eq!(acme.fields.founding_year, Some(2018));
    assert_eq!(acme.fields.location.as_deref(), Some("Brasil"));
    h.pool.close().await;
}

#[tokio::test]
async fn test_rejected_write_keeps_earlier_records() {
    let server = MockServer::start().await;
    mount_reply(
        &server,
        "Kaszek",
        &table(&[
            "First; ; ; ; ; ; ; ; ; ; ",
            "Boom; ; ; ; ; ; ; ; ; ; ",
            "Never; ; ; ; ; ; ; ; ; ; ",
        ]),
    )
    .await;

    let h = harness(&server, 5).await;
    sqlx::query(
        "CREATE TRIGGER reject_boom BEFORE INSERT ON startups WHEN NEW.name = 'Boom'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(&h.pool)
    .await
    .unwrap();

    let report = h.pipeline.run_report(&subjects(&["Kaszek"])).await;
    assert_eq!(report.candidates, 3);
    assert_eq!(report.merged, 1);
    assert_eq!(report.halted_at.as_deref(), Some("Boom"));

    let names: Vec<_> = h
        .store
        .list(0, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.fields.name)
        .collect();
    assert_eq!(names, vec!["First"]);
    h.pool.close().await;
}

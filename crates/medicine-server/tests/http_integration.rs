use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use common::snapshot::JsonSnapshotSource;
use embeddings::QueryEncoder;
use futures::future::BoxFuture;
use llm::{GenerationRequest, SymptomAdvisor, TextGenerator};
use medicine_server::{app, state::AppState};
use serde_json::{Value, json};
use tower::ServiceExt;

struct OriginEncoder;

impl QueryEncoder for OriginEncoder {
    fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![0.0, 0.0])
    }
}

struct CannedModel(&'static str);

impl TextGenerator for CannedModel {
    fn generate<'a>(&'a self, _request: GenerationRequest<'a>) -> BoxFuture<'a, Result<String>> {
        let reply = self.0.to_string();
        Box::pin(async move { Ok(reply) })
    }
}

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/catalog.json")
}

fn columns() -> Vec<String> {
    vec!["embedding_filter_2".to_string(), "embedding_filter_3".to_string()]
}

fn state_for(path: PathBuf) -> AppState {
    AppState::for_tests(Arc::new(JsonSnapshotSource::new(path, columns())), Arc::new(OriginEncoder))
        .expect("state")
}

fn state() -> AppState {
    state_for(fixture())
}

fn unique_tmp_file(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}.json", std::process::id()))
}

async fn send(state: AppState, req: Request<Body>) -> (StatusCode, Value) {
    let res = app::router(state).oneshot(req).await.expect("response");
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.expect("bytes");
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn batch_ids(json: &Value) -> Vec<String> {
    json["results"]
        .as_array()
        .expect("results array")
        .iter()
        .map(|hit| hit["batch_id"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn health_reports_loaded_catalog() {
    let (status, json) = send(state(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["records"], 4);
    assert_eq!(json["vector_dimension"], 2);
    assert_eq!(json["advisor_enabled"], false);
    assert_eq!(json["spaces"], json!(["disease_symptom", "form_category"]));
}

#[tokio::test]
async fn batch_id_query_takes_fast_path_and_echoes_correlation_id() {
    let res = app::router(state())
        .oneshot(get("/search?query=BATCH_101"))
        .await
        .expect("response");
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-correlation-id"));
    let body = to_bytes(res.into_body(), usize::MAX).await.expect("bytes");
    let json: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(batch_ids(&json), vec!["BATCH_101", "BATCH_1010"]);
    assert_eq!(json["total"], 2);
    assert_eq!(json["results"][0]["relevance_score"], 1.0);
}

#[tokio::test]
async fn caller_correlation_id_is_kept() {
    let req = Request::builder()
        .uri("/health")
        .header("x-correlation-id", "req-42")
        .body(Body::empty())
        .expect("request");
    let res = app::router(state()).oneshot(req).await.expect("response");
    assert_eq!(res.headers()["x-correlation-id"], "req-42");
}

#[tokio::test]
async fn query_string_accepts_form_filter_alias() {
    let (status, json) = send(state(), get("/search?query=fever&form_filter=Tablet")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch_ids(&json), vec!["BATCH_101", "BATCH_102", "BATCH_1010"]);
}

#[tokio::test]
async fn posted_search_applies_range_filters() {
    let (status, json) = send(
        state(),
        post_json("/search", &json!({ "query": "paracetamol", "filters": { "max_price": 30.0 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch_ids(&json), vec!["BATCH_101", "BATCH_1010"]);
    assert_eq!(json["results"][0]["relevance_score"], 2.0);
}

#[tokio::test]
async fn filter_only_request_browses_catalog() {
    let (status, json) = send(state(), get("/search?category=Analgesics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch_ids(&json), vec!["BATCH_101", "BATCH_102"]);
    assert_eq!(json["results"][0]["relevance_score"], 0.0);
}

#[tokio::test]
async fn blank_query_without_filters_is_bad_request() {
    let (status, json) = send(state(), post_json("/search", &json!({ "query": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    insta::assert_snapshot!(json.to_string(), @r#"{"error":"no query or filters provided"}"#);
}

#[tokio::test]
async fn oversized_query_is_bad_request() {
    let query = "a".repeat(search_core::MAX_QUERY_CHARS + 1);
    let (status, json) = send(state(), post_json("/search", &json!({ "query": query }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "query exceeds 1024 characters");
}

#[tokio::test]
async fn reload_requires_token_when_configured() {
    let mut state = state();
    state.api_token = Some("secret-token".to_string());

    let unauthorized = Request::builder()
        .method("POST")
        .uri("/admin/reload")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(state.clone(), unauthorized).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let authorized = Request::builder()
        .method("POST")
        .uri("/admin/reload")
        .header("x-api-token", "secret-token")
        .body(Body::empty())
        .expect("request");
    let (status, json) = send(state, authorized).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["records"], 4);
}

#[tokio::test]
async fn failed_reload_keeps_serving_previous_snapshot() {
    let path = unique_tmp_file("medisearch-reload");
    std::fs::copy(fixture(), &path).expect("copy fixture");
    let state = state_for(path.clone());
    std::fs::write(&path, "[{\"Batch_ID\": \"BATCH_1\"}]").expect("overwrite");

    let reload = Request::builder()
        .method("POST")
        .uri("/admin/reload")
        .body(Body::empty())
        .expect("request");
    let (status, json) = send(state.clone(), reload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("embedding_filter_2")));

    let (status, json) = send(state, get("/search?query=BATCH_102")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(batch_ids(&json), vec!["BATCH_102"]);
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn reload_with_new_vector_dimension_is_refused() {
    let path = unique_tmp_file("medisearch-redim");
    std::fs::copy(fixture(), &path).expect("copy fixture");
    let state = state_for(path.clone());
    let widened = json!([{
        "Batch_ID": "BATCH_900",
        "Name of Medicine": "Zincovit",
        "embedding_filter_2": [0.0, 0.0, 1.0],
        "embedding_filter_3": [0.0, 0.0, 1.0]
    }]);
    std::fs::write(&path, widened.to_string()).expect("overwrite");

    let reload = Request::builder()
        .method("POST")
        .uri("/admin/reload")
        .body(Body::empty())
        .expect("request");
    let (status, json) = send(state.clone(), reload).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("from 2 to 3")));

    let (_, health) = send(state, get("/health")).await;
    assert_eq!(health["records"], 4);
    assert_eq!(health["vector_dimension"], 2);
    let _ = std::fs::remove_file(path);
}

struct PanickingEncoder;

impl QueryEncoder for PanickingEncoder {
    fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        panic!("encoder state corrupted")
    }
}

#[tokio::test]
async fn crashed_search_worker_yields_empty_results() {
    let state = AppState::for_tests(
        Arc::new(JsonSnapshotSource::new(fixture(), columns())),
        Arc::new(PanickingEncoder),
    )
    .expect("state");
    let (status, json) = send(state, get("/search?query=fever")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 0);
    assert_eq!(json["results"], json!([]));
}

#[tokio::test]
async fn advise_is_unavailable_without_model_key() {
    let (status, json) = send(state(), post_json("/advise", &json!({ "query": "stomach ache" }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(json["error"].as_str().is_some_and(|e| e.contains("GENAI_API_KEY")));
}

#[tokio::test]
async fn advise_returns_model_json() {
    let mut state = state();
    state.advisor = Some(Arc::new(SymptomAdvisor::new(
        Arc::new(CannedModel(
            "```json\n{\"AI Response\": \"This person has fever\", \"Medicines\": [{\"S.no\": 1, \"Name\": \"Paracetamol\"}], \"Score\": \"85%\"}\n```",
        )),
        "gemini-2.5-flash",
    )));
    let (status, json) = send(state, post_json("/advise", &json!({ "query": "fever and headache" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["Medicines"][0]["Name"], "Paracetamol");
    assert_eq!(json["Score"], "85%");
}

#[tokio::test]
async fn advise_reports_unparseable_model_reply() {
    let mut state = state();
    state.advisor = Some(Arc::new(SymptomAdvisor::new(
        Arc::new(CannedModel("Please consult a doctor.")),
        "gemini-2.5-flash",
    )));
    let (status, json) = send(state, post_json("/advise", &json!({ "query": "fever" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], "Invalid response format from AI.");
}

#[tokio::test]
async fn schemas_and_metrics_are_served() {
    let (status, json) = send(state(), get("/schemas")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["search_request"].is_object());
    assert!(json["medicine_record"].is_object());

    let res = app::router(state()).oneshot(get("/metrics")).await.expect("response");
    assert_eq!(res.status(), StatusCode::OK);
}

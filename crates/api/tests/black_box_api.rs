use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use dealbrief_ai::{LlmClient, LlmError};
use dealbrief_api::app::services::AppServices;
use dealbrief_infra::jobs::{BackoffStrategy, InMemoryJobStore, JobExecutorConfig, RetryPolicy};
use dealbrief_infra::record_store::InMemoryRecordStore;

/// Deterministic LLM stand-in for end-to-end runs.
enum ScriptedLlm {
    AlwaysOk(&'static str),
    AlwaysFail,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn transcript_insight(&self, _transcript_text: &str) -> Result<String, LlmError> {
        self.answer()
    }

    async fn icebreaker_analysis(
        &self,
        _linkedin_bio: &str,
        _pitch_deck: &str,
    ) -> Result<String, LlmError> {
        self.answer()
    }
}

impl ScriptedLlm {
    fn answer(&self) -> Result<String, LlmError> {
        match self {
            ScriptedLlm::AlwaysOk(text) => Ok(text.to_string()),
            ScriptedLlm::AlwaysFail => Err(LlmError::Request("provider unavailable".to_string())),
        }
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Same router as prod, in-memory stores, scripted LLM, fast retry
    /// timings so exhaustion scenarios finish in milliseconds.
    async fn spawn(llm: ScriptedLlm) -> Self {
        let records = Arc::new(InMemoryRecordStore::new());
        let jobs = Arc::new(InMemoryJobStore::new());

        let mut services = AppServices::new(records, jobs, Arc::new(llm)).with_retry_policy(
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                strategy: BackoffStrategy::Exponential,
            },
        );
        services.spawn_executor(JobExecutorConfig {
            poll_interval: Duration::from_millis(10),
            ..JobExecutorConfig::default().with_name("test-worker")
        });

        let app = dealbrief_api::app::router_with(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll an endpoint until its `status` field reaches `wanted`.
///
/// The worker runs asynchronously, so both the record view and the queue
/// view converge eventually rather than immediately.
async fn get_status_eventually(
    client: &reqwest::Client,
    url: &str,
    wanted: &str,
) -> serde_json::Value {
    for _ in 0..500 {
        let res = client.get(url).send().await.unwrap();
        if res.status() == StatusCode::OK {
            let body: serde_json::Value = res.json().await.unwrap();
            if body["status"] == wanted {
                return body;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{url} did not reach status {wanted:?} within timeout");
}

#[tokio::test]
async fn health_reports_up_without_checking_dependencies() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("ok")).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn transcript_submission_runs_to_completion() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("a thorough meeting review")).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/transcripts", srv.base_url))
        .json(&json!({
            "company_name": "Acme",
            "attendees": ["A", "B"],
            "date": "2024-01-01",
            "transcript_text": "we discussed the roadmap",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let submitted: serde_json::Value = res.json().await.unwrap();
    assert_eq!(submitted["status"], "queued");
    assert!(
        submitted["message"].as_str().unwrap().contains("Acme"),
        "submission message should name the company"
    );
    let record_id = submitted["id"].as_str().unwrap().to_string();
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    let record = get_status_eventually(
        &client,
        &format!("{}/transcripts/{}", srv.base_url, record_id),
        "completed",
    )
    .await;
    assert_eq!(record["insight_result"], "a thorough meeting review");
    assert_eq!(record["company_name"], "Acme");

    // Queue-side view converges to the same outcome.
    let status = get_status_eventually(
        &client,
        &format!("{}/tasks/status/{}", srv.base_url, task_id),
        "succeeded",
    )
    .await;
    assert!(status["result"].is_object());
}

#[tokio::test]
async fn linkedin_failure_exhausts_retries_and_stays_failed() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysFail).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/linkedin", srv.base_url))
        .json(&json!({
            "linkedin_bio": "Founder at Example",
            "pitch_deck_content": "Series A deck",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    let submitted: serde_json::Value = res.json().await.unwrap();
    let record_id = submitted["id"].as_str().unwrap().to_string();
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    let record = get_status_eventually(
        &client,
        &format!("{}/linkedin/{}", srv.base_url, record_id),
        "failed",
    )
    .await;
    assert!(record["icebreaker_result"].is_null());

    let status = get_status_eventually(
        &client,
        &format!("{}/tasks/status/{}", srv.base_url, task_id),
        "failed",
    )
    .await;
    assert_eq!(status["attempts"], 3);
}

#[tokio::test]
async fn unknown_task_id_maps_to_unknown_not_an_error() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("ok")).await;
    let client = reqwest::Client::new();

    // A well-formed id the queue has never seen.
    let res = client
        .get(format!(
            "{}/tasks/status/{}",
            srv.base_url,
            uuid::Uuid::now_v7()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "unknown");

    // Garbage that does not even parse as an id.
    let res = client
        .get(format!("{}/tasks/status/not-a-uuid", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "unknown");
}

#[tokio::test]
async fn blank_transcript_text_is_rejected_before_queueing() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("ok")).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/transcripts", srv.base_url))
        .json(&json!({
            "company_name": "Acme",
            "attendees": [],
            "date": "2024-01-01",
            "transcript_text": "   ",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing was inserted or queued.
    let res = client
        .get(format!("{}/transcripts", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body.as_array().unwrap().len(), 0);

    let res = client
        .get(format!("{}/tasks/queue/stats", srv.base_url))
        .send()
        .await
        .unwrap();
    let stats: serde_json::Value = res.json().await.unwrap();
    assert_eq!(stats["reserved_tasks"], 0);
    assert_eq!(stats["active_tasks"], 0);
    assert_eq!(stats["workers_online"], 1);
}

#[tokio::test]
async fn record_queries_handle_unknown_and_malformed_ids() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("ok")).await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!(
            "{}/transcripts/{}",
            srv.base_url,
            uuid::Uuid::now_v7()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/linkedin/not-a-uuid", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_endpoints_include_submitted_records() {
    let srv = TestServer::spawn(ScriptedLlm::AlwaysOk("insight text")).await;
    let client = reqwest::Client::new();

    for name in ["First Co", "Second Co"] {
        let res = client
            .post(format!("{}/transcripts", srv.base_url))
            .json(&json!({
                "company_name": name,
                "attendees": ["X"],
                "date": "2024-06-15",
                "transcript_text": "notes",
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .get(format!("{}/transcripts", srv.base_url))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = res.json().await.unwrap();
    let names: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["company_name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"First Co".to_string()));
    assert!(names.contains(&"Second Co".to_string()));
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use analysis_engine::{
    AnalysisApi, AnalysisRequest, ApiError, Article, CheckResponse, ClientSettings, EngineEvent,
    EngineHandle, FailureKind, PollEvent, PollSettings, SessionError, SessionOutcome, TaskId,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(20),
        ceiling: Duration::from_secs(5),
    }
}

fn engine_for(server: &MockServer) -> EngineHandle {
    analysis_logging::initialize_for_tests();
    EngineHandle::new(
        ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        },
        fast_polling(),
    )
    .expect("engine")
}

/// Collects events until `done` matches one or the deadline passes.
fn collect_until(
    engine: &EngineHandle,
    done: impl Fn(&EngineEvent) -> bool,
) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut events = Vec::new();
    while Instant::now() < deadline {
        if let Ok(Some(event)) = engine.recv_timeout(Duration::from_millis(50)) {
            let finished = done(&event);
            events.push(event);
            if finished {
                break;
            }
        }
    }
    events
}

fn is_finished(event: &EngineEvent) -> bool {
    matches!(event, EngineEvent::Poll(PollEvent::Finished { .. }))
}

#[tokio::test(flavor = "multi_thread")]
async fn search_reports_articles() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scrape-articles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "title": "Banana diseases", "url": "https://doi.org/10.1201/b10514-12" }
        ])))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.search("banana");

    let events = tokio::task::spawn_blocking(move || {
        collect_until(&engine, |event| matches!(event, EngineEvent::ArticlesFound(_)))
    })
    .await
    .unwrap();

    match events.last() {
        Some(EngineEvent::ArticlesFound(articles)) => {
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].title, "Banana diseases");
        }
        other => panic!("expected articles, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn search_failure_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scrape-articles"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.search("banana");

    let events = tokio::task::spawn_blocking(move || {
        collect_until(&engine, |event| matches!(event, EngineEvent::SearchFailed(_)))
    })
    .await
    .unwrap();

    assert!(matches!(
        events.last(),
        Some(EngineEvent::SearchFailed(err)) if err.kind == FailureKind::HttpStatus(502)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn analysis_runs_to_delivered_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": "job-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/check-analysis/job-1"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/check-analysis/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "pending", "progress": 50, "status_message": "Writing results"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/check-analysis/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.start_analysis(9, vec!["https://a".to_string(), "https://b".to_string()]);

    let events = tokio::task::spawn_blocking(move || collect_until(&engine, is_finished))
        .await
        .unwrap();

    assert_eq!(
        events.first(),
        Some(&EngineEvent::Poll(PollEvent::Started {
            session_id: 9,
            task_id: TaskId::new("job-1"),
        }))
    );
    assert!(events.iter().any(|event| matches!(
        event,
        EngineEvent::Poll(PollEvent::Progress { session_id: 9, status }) if status.progress() == 50
    )));
    match events.last() {
        Some(EngineEvent::Poll(PollEvent::Finished {
            session_id: 9,
            outcome: SessionOutcome::Completed(artifact),
        })) => assert_eq!(artifact.bytes, b"%PDF-1.4"),
        other => panic!("expected delivered document, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_link_list_fails_to_start() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.start_analysis(1, vec!["  ".to_string()]);

    let events = tokio::task::spawn_blocking(move || collect_until(&engine, is_finished))
        .await
        .unwrap();

    assert!(matches!(
        events.last(),
        Some(EngineEvent::Poll(PollEvent::Finished {
            outcome: SessionOutcome::Failed(SessionError::Start(err)),
            ..
        })) if err.kind == FailureKind::EmptyRequest
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_ends_the_active_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/start-analysis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "task_id": "slow" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/check-analysis/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "pending", "progress": 1, "status_message": "Queued"
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    engine.start_analysis(3, vec!["https://a".to_string()]);

    let events = tokio::task::spawn_blocking(move || {
        let mut events = collect_until(&engine, |event| {
            matches!(event, EngineEvent::Poll(PollEvent::Progress { .. }))
        });
        engine.cancel(3);
        events.extend(collect_until(&engine, is_finished));
        events
    })
    .await
    .unwrap();

    assert_eq!(
        events.last(),
        Some(&EngineEvent::Poll(PollEvent::Finished {
            session_id: 3,
            outcome: SessionOutcome::Cancelled,
        }))
    );
}

/// Search requests panic; analysis calls are never made.
struct BrokenSearchApi;

#[async_trait::async_trait]
impl AnalysisApi for BrokenSearchApi {
    async fn scrape_articles(&self, _prompt: &str) -> Result<Vec<Article>, ApiError> {
        panic!("scraper crashed")
    }

    async fn start_analysis(&self, _request: &AnalysisRequest) -> Result<TaskId, ApiError> {
        unreachable!("no analysis in this test")
    }

    async fn check_analysis(&self, _task_id: &TaskId) -> Result<CheckResponse, ApiError> {
        unreachable!("no analysis in this test")
    }
}

#[test]
fn panicking_search_still_answers() {
    analysis_logging::initialize_for_tests();
    let engine = EngineHandle::with_api(Arc::new(BrokenSearchApi), PollSettings::default());
    engine.search("coffee and sleep");

    let events = collect_until(&engine, |event| {
        matches!(event, EngineEvent::SearchFailed(_))
    });

    assert!(
        matches!(events.last(), Some(EngineEvent::SearchFailed(err)) if err.kind == FailureKind::Aborted),
        "{events:?}"
    );
}

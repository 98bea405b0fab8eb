use composer::domain::errors::{ComposerError, TransformError};
use composer::domain::models::{Action, ActionRequest};
use composer::domain::ports::{TransformRequest, TransformService};
use composer::infrastructure::document::MemoryDocument;
use composer::infrastructure::transform::{HttpTransformConfig, HttpTransformService, RetryPolicy};
use composer::services::{
    ActionEvent, ActionOrchestrator, OrchestratorSettings, StreamingTransformClient,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer, api_key: Option<&str>) -> HttpTransformService {
    HttpTransformService::new(HttpTransformConfig {
        endpoint: format!("{}/v1/transform", server.uri()),
        api_key: api_key.map(str::to_string),
        connect_timeout_secs: 5,
        establish_timeout_secs: 5,
    })
    .unwrap()
}

fn grammar_request(text: &str) -> TransformRequest {
    TransformRequest::new(
        &ActionRequest::new(Action::Grammar, "gpt-4o-mini", 0.5),
        text,
    )
}

fn sse(events: &[&str]) -> ResponseTemplate {
    let body: String = events.iter().map(|data| format!("data: {data}\n\n")).collect();
    ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream")
}

async fn collect_text(service: &HttpTransformService, request: &TransformRequest) -> Result<String, TransformError> {
    let mut stream = service.open_stream(request).await?;
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?.text);
    }
    Ok(text)
}

#[tokio::test]
async fn test_sse_stream_is_decoded_into_chunks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "text": "He go to school yesterday.",
            "modelId": "gpt-4o-mini",
            "action": "grammar"
        })))
        .respond_with(sse(&[
            r#"{"type":"delta","text":"He "}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"delta","text":"went "}"#,
            r#"{"type":"delta","text":"to school yesterday."}"#,
            r#"{"type":"done"}"#,
        ]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, Some("test-key"));
    let mut stream = service
        .open_stream(&grammar_request("He go to school yesterday."))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap().text);
    }
    assert_eq!(chunks, vec!["He ", "went ", "to school yesterday."]);
}

#[tokio::test]
async fn test_translate_parameters_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(body_partial_json(serde_json::json!({
            "action": "translate",
            "actionParams": {"language": "French"}
        })))
        .respond_with(sse(&[r#"{"type":"delta","text":"Bonjour"}"#, "[DONE]"]))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, None);
    let request = TransformRequest::new(
        &ActionRequest::new(
            Action::Translate {
                language: "French".to_string(),
            },
            "gpt-4o-mini",
            0.5,
        ),
        "Hello",
    );

    assert_eq!(collect_text(&service, &request).await.unwrap(), "Bonjour");
}

#[tokio::test]
async fn test_plain_text_body_is_streamed_as_is() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("Plain rewrite.", "text/plain"))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, None);
    let text = collect_text(&service, &grammar_request("plain")).await.unwrap();
    assert_eq!(text, "Plain rewrite.");
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(body_partial_json(serde_json::json!({"text": "unauthorized"})))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(body_partial_json(serde_json::json!({"text": "limited"})))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(body_partial_json(serde_json::json!({"text": "down"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, Some("wrong"));

    let err = service.open_stream(&grammar_request("unauthorized")).await.err();
    assert_eq!(err, Some(TransformError::Unauthorized));

    let err = service.open_stream(&grammar_request("limited")).await.err();
    assert_eq!(err, Some(TransformError::RateLimited));

    let err = service.open_stream(&grammar_request("down")).await.err().unwrap();
    assert_eq!(
        err,
        TransformError::Server {
            status: 503,
            body: "maintenance".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_sse_without_completion_signal_is_protocol_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(sse(&[r#"{"type":"delta","text":"Half"}"#]))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, None);
    let mut stream = service.open_stream(&grammar_request("text")).await.unwrap();

    assert_eq!(stream.next().await.unwrap().unwrap().text, "Half");
    assert!(matches!(
        stream.next().await,
        Some(Err(TransformError::Protocol(_)))
    ));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_backend_error_event_ends_stream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(sse(&[
            r#"{"type":"delta","text":"Some"}"#,
            r#"{"type":"error","message":"model overloaded"}"#,
            r#"{"type":"delta","text":"ignored"}"#,
        ]))
        .mount(&mock_server)
        .await;

    let service = service_for(&mock_server, None);
    let err = collect_text(&service, &grammar_request("text")).await.unwrap_err();
    assert_eq!(err, TransformError::Backend("model overloaded".to_string()));
}

#[tokio::test]
async fn test_client_retries_unavailable_service() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .respond_with(sse(&[r#"{"type":"delta","text":"Recovered"}"#, "[DONE]"]))
        .mount(&mock_server)
        .await;

    let client = StreamingTransformClient::new(
        Arc::new(service_for(&mock_server, None)),
        RetryPolicy::new(3, 10, 50),
    );
    let stream = client
        .invoke(&grammar_request("text"), CancellationToken::new())
        .await
        .unwrap();

    let chunks: Vec<_> = stream.collect().await;
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].as_ref().unwrap().text, "Recovered");

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_client_gives_up_on_permanent_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown model"))
        .mount(&mock_server)
        .await;

    let client = StreamingTransformClient::new(
        Arc::new(service_for(&mock_server, None)),
        RetryPolicy::new(3, 10, 50),
    );
    let err = client
        .invoke(&grammar_request("text"), CancellationToken::new())
        .await
        .err()
        .unwrap();

    assert_eq!(
        err,
        ComposerError::StreamEstablish {
            attempts: 1,
            source: TransformError::InvalidRequest("unknown model".to_string()),
        }
    );
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_orchestrator_rewrites_selection_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transform"))
        .and(body_partial_json(serde_json::json!({"text": "He go to school yesterday."})))
        .respond_with(sse(&[
            r#"{"type":"delta","text":"He went "}"#,
            r#"{"type":"delta","text":"to school yesterday."}"#,
            r#"{"type":"done"}"#,
        ]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut document = MemoryDocument::new("Monday.\nHe go to school yesterday.\nTuesday.");
    document.select_text("He go to school yesterday.").unwrap();

    let client = StreamingTransformClient::new(
        Arc::new(service_for(&mock_server, None)),
        RetryPolicy::new(3, 10, 50),
    );
    let orchestrator = ActionOrchestrator::new(
        Arc::new(tokio::sync::Mutex::new(document)),
        client,
        OrchestratorSettings::default(),
    );
    let mut events = orchestrator.subscribe_events();

    orchestrator.open_panel().await;
    orchestrator
        .dispatch(ActionRequest::new(Action::Grammar, "gpt-4o-mini", 0.5))
        .unwrap();

    let terminal = loop {
        let event = events.recv().await.unwrap();
        if event.is_terminal() {
            break event;
        }
    };
    assert!(matches!(terminal, ActionEvent::Completed { .. }), "got {terminal:?}");
    orchestrator.wait_idle().await;

    let shared = orchestrator.document();
    let content = shared.lock().await.content().to_string();
    assert_eq!(content, "Monday.\nHe went to school yesterday.\nTuesday.");
}

#[tokio::test]
async fn test_stalled_error_body_does_not_hold_establishment() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Sends a 503 status and part of the announced body, then goes quiet
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = vec![0_u8; 8192];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-type: text/plain\r\ncontent-length: 100\r\n\r\npartial")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        drop(socket);
    });

    let service = HttpTransformService::new(HttpTransformConfig {
        endpoint: format!("http://{addr}/v1/transform"),
        api_key: None,
        connect_timeout_secs: 5,
        establish_timeout_secs: 1,
    })
    .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        service.open_stream(&grammar_request("text")),
    )
    .await
    .expect("establishment must give up on the stalled body");

    let err = outcome.err().unwrap();
    assert!(
        matches!(err, TransformError::Server { status: 503, .. }),
        "got {err:?}"
    );
    assert!(err.is_transient(), "still eligible for retry");
}

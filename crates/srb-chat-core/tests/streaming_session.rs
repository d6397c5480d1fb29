//! End-to-end tests of the session against a mock HTTP backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use srb_chat_core::{
    ChatConfig, ChatSession, Completion, HttpBackend, NotificationLevel, TransportError,
    TurnFailure, TurnOutcome,
};

fn sse(frames: &[&str]) -> ResponseTemplate {
    let body: String = frames.iter().map(|f| format!("{f}\n\n")).collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

fn session_for(server: &MockServer) -> (ChatSession, Arc<HttpBackend>) {
    let config = ChatConfig::with_backend(server.uri());
    let backend = Arc::new(HttpBackend::new(config.clone()).unwrap());
    (ChatSession::new(config), backend)
}

#[tokio::test]
async fn streams_reply_into_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .and(header("accept", "text/event-stream"))
        .and(body_json(json!({"message": "Explain the attendance rules."})))
        .respond_with(sse(&[
            r#"data: {"chunk": "Attendance ", "done": false}"#,
            r#"data: {"chunk": "is 75%.", "done": false}"#,
            r#"data: {"chunk": "", "done": true}"#,
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let (mut session, backend) = session_for(&server);
    let outcome = session
        .submit(backend, "  Explain the attendance rules.  ")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            content: "Attendance is 75%.".to_string(),
            completion: Completion::DoneSignal,
        }
    );
    let messages = session.messages();
    assert_eq!(messages.len(), 3);
    assert!(messages[1].is_user());
    assert_eq!(messages[2].content, "Attendance is 75%.");
    assert!(!session.is_pending());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn malformed_frames_do_not_corrupt_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(sse(&[
            r#"data: {"chunk":"A"}"#,
            "not-json-at-all",
            r#"data: {"chunk":"#,
            ": keep-alive comment",
            r#"data: {"chunk":"B"}"#,
            r#"data: {"done":true}"#,
        ]))
        .mount(&server)
        .await;

    let (mut session, backend) = session_for(&server);
    session.submit(backend, "q").await.unwrap();

    assert_eq!(session.messages().last().unwrap().content, "AB");
}

#[tokio::test]
async fn non_success_status_takes_error_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(ResponseTemplate::new(503).set_body_json(
            json!({"detail": "Models not loaded. Please check if preprocessed files exist."}),
        ))
        .mount(&server)
        .await;

    let (mut session, backend) = session_for(&server);
    let outcome = session.submit(backend, "q").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Failed(TurnFailure::Status(503)));
    let notice = &session.messages().last().unwrap().content;
    assert!(notice.starts_with("Sorry, I encountered an error"));
    assert!(notice.contains(&server.uri()));

    let notes = session.take_notifications();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
    assert!(!session.is_pending());
}

#[tokio::test]
async fn error_frame_takes_error_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/stream"))
        .respond_with(sse(&[
            r#"data: {"chunk":"Partial","done":false}"#,
            r#"data: {"error":"backend down","done":true}"#,
        ]))
        .mount(&server)
        .await;

    let (mut session, backend) = session_for(&server);
    let outcome = session.submit(backend, "q").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Backend("backend down".to_string()))
    );
    assert_eq!(
        session.messages().last().unwrap().content,
        session.config().failure_notice()
    );
}

#[tokio::test]
async fn unreachable_backend_takes_error_path() {
    let config = ChatConfig::with_backend("http://127.0.0.1:9");
    let backend = Arc::new(HttpBackend::new(config.clone()).unwrap());
    let mut session = ChatSession::new(config);

    let outcome = session.submit(backend, "q").await.unwrap();

    assert!(matches!(
        outcome,
        TurnOutcome::Failed(TurnFailure::Transport(_))
    ));
    assert_eq!(session.take_notifications().len(), 1);
    assert!(!session.is_busy());
}

#[tokio::test]
async fn health_reports_backend_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "healthy", "models_loaded": true})),
        )
        .mount(&server)
        .await;

    let (_, backend) = session_for(&server);
    let health = backend.health().await.unwrap();

    assert!(health.is_ready());
}

#[tokio::test]
async fn health_gives_up_on_silent_backend() {
    // Accepts connections and never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = ChatConfig::with_backend(format!("http://{addr}"));
    config.health_timeout_seconds = 1;
    let backend = HttpBackend::new(config).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), backend.health())
        .await
        .expect("health check should time out on its own");

    assert!(matches!(result, Err(TransportError::Http(_))));
}

#[tokio::test]
async fn ask_uses_non_streaming_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({"message": "What are the library borrowing limits?"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "Four books.", "status": "success"})),
        )
        .mount(&server)
        .await;

    let (_, backend) = session_for(&server);
    let reply = backend
        .ask("What are the library borrowing limits?")
        .await
        .unwrap();

    assert_eq!(reply.response, "Four books.");
    assert_eq!(reply.status, "success");
}

#[tokio::test]
async fn ask_surfaces_backend_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"detail": "Error processing your question: boom"})),
        )
        .mount(&server)
        .await;

    let (_, backend) = session_for(&server);
    match backend.ask("q").await {
        Err(TransportError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("boom"));
        }
        other => panic!("Expected Status error, got {other:?}"),
    }
}

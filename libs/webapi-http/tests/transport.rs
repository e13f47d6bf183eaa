#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Transport behaviour against a local mock server.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderValue, Method, StatusCode};
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{Value, json};
use webapi_http::{
    CallContext, CallError, HttpError, HttpTransport, HttpTransportBuilder, OutgoingRequest,
    ParseOptions, TransportConfig,
};

fn transport() -> HttpTransport {
    HttpTransportBuilder::with_config(TransportConfig::for_testing())
        .build()
        .unwrap()
}

async fn get(transport: &HttpTransport, url: String) -> Result<webapi_http::WebApiResponse, CallError> {
    transport
        .execute(OutgoingRequest::new(Method::GET, url), &ParseOptions::default())
        .await
}

#[tokio::test]
async fn test_no_content_is_success_without_data() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/accounts");
            then.status(204);
        })
        .await;

    let response = get(&transport(), server.url("/accounts")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.data, Value::Null);
}

#[tokio::test]
async fn test_success_body_is_parsed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/accounts");
            then.status(200)
                .header("content-type", "application/json")
                .header("odata-version", "4.0")
                .body(r#"{"value":[{"name":"Contoso"}]}"#);
        })
        .await;

    let response = get(&transport(), server.url("/accounts")).await.unwrap();

    assert_eq!(response.data["value"][0]["name"], "Contoso");
    assert_eq!(response.headers["odata-version"], "4.0");
}

#[tokio::test]
async fn test_unparsable_error_body_becomes_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(400).body("Bad Request - Invalid URL");
        })
        .await;

    match get(&transport(), server.url("/broken")).await {
        Err(CallError::Status(err)) => {
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.message, "Bad Request - Invalid URL");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_service_error_object_is_normalized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).header("content-type", "application/json").body(
                r#"{"error":{"code":"0x80040217","message":"account With Id = 1 Does Not Exist"}}"#,
            );
        })
        .await;

    let err = get(&transport(), server.url("/missing")).await.unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    match err {
        CallError::Status(err) => {
            assert_eq!(err.code.as_deref(), Some("0x80040217"));
            assert_eq!(err.message, "account With Id = 1 Does Not Exist");
            assert_eq!(err.status_message, "Not Found");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_error_body_is_unexpected_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(502);
        })
        .await;

    match get(&transport(), server.url("/down")).await {
        Err(CallError::Status(err)) => assert_eq!(err.message, "Unexpected Error"),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_array_is_multi_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/$batch");
            then.status(400)
                .body(r#"[{"error":{"message":"first"}},{"error":{"message":"second"}}]"#);
        })
        .await;

    let request = OutgoingRequest::new(Method::POST, server.url("/$batch")).with_body(
        HeaderValue::from_static("multipart/mixed;boundary=batch_1"),
        Bytes::from_static(b"--batch_1--"),
    );
    match transport().execute(request, &ParseOptions::default()).await {
        Err(CallError::MultiStatus { status, errors }) => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(errors[1]["error"]["message"], "second");
        }
        other => panic!("expected multi status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_body_headers_are_sent() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/accounts")
                .header("content-type", "application/json; charset=utf-8")
                .header("content-length", "18")
                .header("user-agent", "agent/2.0")
                .json_body(json!({ "name": "Contoso" }));
            then.status(204);
        })
        .await;

    let transport = HttpTransportBuilder::with_config(TransportConfig::for_testing())
        .user_agent("agent/2.0")
        .build()
        .unwrap();
    let request = OutgoingRequest::new(Method::POST, server.url("/accounts"))
        .with_json(&json!({ "name": "Contoso" }))
        .unwrap();

    transport
        .execute(request, &ParseOptions::default())
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_timeout_aborts_call() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(2)).body("{}");
        })
        .await;

    let request = OutgoingRequest::new(Method::GET, server.url("/slow"))
        .with_timeout(Duration::from_millis(100));
    let err = transport()
        .execute(request, &ParseOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/large");
            then.status(200).body("x".repeat(4096));
        })
        .await;

    let transport = HttpTransportBuilder::with_config(TransportConfig::for_testing())
        .max_body_size(1024)
        .build()
        .unwrap();

    assert!(matches!(
        get(&transport, server.url("/large")).await,
        Err(CallError::Transport(HttpError::BodyTooLarge { limit: 1024, .. }))
    ));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let transport = transport();
    let err = get(&transport, "http://127.0.0.1:1/accounts".to_owned())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::Transport(HttpError::Transport(_))));
}

#[tokio::test]
async fn test_concurrent_calls_keep_their_own_options() {
    let server = MockServer::start_async().await;
    let body = r#"{"@odata.count":42,"value":[{"fullname":"Ann"}]}"#;
    // first dispatched, last to complete
    server
        .mock_async(|when, then| {
            when.method(GET).path("/contacts-slow");
            then.status(200).delay(Duration::from_millis(300)).body(body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/contacts");
            then.status(200).body(body);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/empty");
            then.status(204);
        })
        .await;

    let transport = Arc::new(transport());
    let count_options = ParseOptions::default().to_count();
    let plain_options = ParseOptions::default();
    let empty_options = ParseOptions::default().value_if_empty(json!([]));

    let (count, plain, empty) = tokio::join!(
        transport.execute(
            OutgoingRequest::new(Method::GET, server.url("/contacts-slow")),
            &count_options
        ),
        transport.execute(
            OutgoingRequest::new(Method::GET, server.url("/contacts")),
            &plain_options
        ),
        transport.execute(
            OutgoingRequest::new(Method::GET, server.url("/empty")),
            &empty_options
        ),
    );

    assert_eq!(count.unwrap().data, json!(42));
    assert_eq!(plain.unwrap().data["value"][0]["fullname"], "Ann");
    assert_eq!(empty.unwrap().data, json!([]));
    assert_eq!(transport.pool().len(), 1);
}

#[tokio::test]
async fn test_send_runs_exactly_one_continuation() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/fail");
            then.status(500).body(r#"{"Message":"boom"}"#);
        })
        .await;

    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let (s, e) = (Arc::clone(&successes), Arc::clone(&errors));
    let context = CallContext::new(
        ParseOptions::default(),
        move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        },
        move |err: CallError| {
            e.lock().unwrap().push(err.to_string());
        },
    );

    transport()
        .send(OutgoingRequest::new(Method::GET, server.url("/fail")), context)
        .await;

    assert_eq!(successes.load(Ordering::SeqCst), 0);
    assert_eq!(*errors.lock().unwrap(), vec!["HTTP 500: boom".to_owned()]);
}

#[tokio::test]
async fn test_send_through_channel_context() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/whoami");
            then.status(200).body(r#"{"UserId":"00000000-0000-0000-0000-000000000001"}"#);
        })
        .await;

    let transport = Arc::new(transport());
    let (context, outcome) = CallContext::channel(ParseOptions::default());
    let url = server.url("/whoami");
    let sender = Arc::clone(&transport);
    tokio::spawn(async move {
        sender
            .send(OutgoingRequest::new(Method::GET, url), context)
            .await;
    });

    let response = outcome.await.unwrap().unwrap();
    assert_eq!(
        response.data["UserId"],
        "00000000-0000-0000-0000-000000000001"
    );
}

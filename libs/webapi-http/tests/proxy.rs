#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Calls tunnelled through a local `CONNECT` proxy.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use http::Method;
use httpmock::Method::GET;
use httpmock::MockServer;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use webapi_http::{HttpTransport, HttpTransportBuilder, OutgoingRequest, ParseOptions, TransportConfig};
use webapi_request::ProxyConfig;

/// Minimal tunnelling proxy that records every request head it accepts.
struct ConnectProxy {
    addr: SocketAddr,
    heads: Arc<Mutex<Vec<String>>>,
}

impl ConnectProxy {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let heads = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&heads);

        tokio::spawn(async move {
            while let Ok((mut client, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let head = read_head(&mut client).await;
                    let target = head.split_whitespace().nth(1).unwrap().to_owned();
                    seen.lock().unwrap().push(head);

                    let mut upstream = TcpStream::connect(target).await.unwrap();
                    client
                        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
                        .await
                        .unwrap();
                    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
                });
            }
        });

        Self { addr, heads }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn heads(&self) -> Vec<String> {
        self.heads.lock().unwrap().clone()
    }
}

// byte at a time so nothing past the head is consumed
async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

fn has_header(head: &str, name: &str, value: &str) -> bool {
    head.lines().any(|line| {
        line.split_once(':')
            .is_some_and(|(n, v)| n.eq_ignore_ascii_case(name) && v.trim() == value)
    })
}

fn transport(use_env_proxy: bool) -> HttpTransport {
    HttpTransportBuilder::with_config(TransportConfig::for_testing())
        .use_env_proxy(use_env_proxy)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_call_proxy_tunnels_with_credentials() {
    let server = MockServer::start_async().await;
    let target = server.address().to_string();
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/data/v9.2/accounts")
                .header("host", target.as_str());
            then.status(200).body(r#"{"value":[]}"#);
        })
        .await;
    let proxy = ConnectProxy::start().await;

    let request = OutgoingRequest::new(Method::GET, server.url("/api/data/v9.2/accounts"))
        .with_proxy(ProxyConfig::new(proxy.url()).with_auth("user", "pass"));
    let response = transport(false)
        .execute(request, &ParseOptions::default())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(response.data["value"], serde_json::json!([]));

    let heads = proxy.heads();
    assert_eq!(heads.len(), 1);
    assert!(
        heads[0].starts_with(&format!("CONNECT {target} HTTP/1.1\r\n")),
        "unexpected head: {}",
        heads[0]
    );
    // base64("user:pass")
    assert!(has_header(&heads[0], "proxy-authorization", "Basic dXNlcjpwYXNz"));
}

#[tokio::test]
async fn test_unauthenticated_proxy_sends_no_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/WhoAmI");
            then.status(200).body("{}");
        })
        .await;
    let proxy = ConnectProxy::start().await;

    let transport = HttpTransportBuilder::with_config(TransportConfig::for_testing())
        .proxy(ProxyConfig::new(proxy.url()))
        .build()
        .unwrap();
    for _ in 0..2 {
        transport
            .execute(
                OutgoingRequest::new(Method::GET, server.url("/WhoAmI")),
                &ParseOptions::default(),
            )
            .await
            .unwrap();
    }

    mock.assert_calls_async(2).await;
    let heads = proxy.heads();
    assert!(!heads.is_empty());
    assert!(heads.iter().all(|head| head.starts_with("CONNECT ")));
    assert!(
        heads
            .iter()
            .all(|head| !head.to_ascii_lowercase().contains("proxy-authorization"))
    );
    assert_eq!(transport.pool().len(), 1);
}

#[test]
fn test_env_proxy_is_picked_up() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (server, proxy) = runtime.block_on(async {
        (MockServer::start_async().await, ConnectProxy::start().await)
    });
    let target = server.address().to_string();

    temp_env::with_vars(
        [
            ("http_proxy", Some(proxy.url())),
            ("HTTP_PROXY", None::<String>),
        ],
        || {
            runtime.block_on(async {
                let mock = server
                    .mock_async(|when, then| {
                        when.method(GET).path("/contacts").header("host", target.as_str());
                        then.status(204);
                    })
                    .await;

                transport(true)
                    .execute(
                        OutgoingRequest::new(Method::GET, server.url("/contacts")),
                        &ParseOptions::default(),
                    )
                    .await
                    .unwrap();

                mock.assert_async().await;
            });
        },
    );

    let heads = proxy.heads();
    assert_eq!(heads.len(), 1);
    assert!(heads[0].starts_with(&format!("CONNECT {target} ")));
}

#[test]
fn test_env_proxy_ignored_when_disabled() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (server, proxy) = runtime.block_on(async {
        (MockServer::start_async().await, ConnectProxy::start().await)
    });

    temp_env::with_var("http_proxy", Some(proxy.url()), || {
        runtime.block_on(async {
            let mock = server
                .mock_async(|when, then| {
                    when.method(GET).path("/contacts");
                    then.status(204);
                })
                .await;

            transport(false)
                .execute(
                    OutgoingRequest::new(Method::GET, server.url("/contacts")),
                    &ParseOptions::default(),
                )
                .await
                .unwrap();

            mock.assert_async().await;
        });
    });

    assert!(proxy.heads().is_empty());
}

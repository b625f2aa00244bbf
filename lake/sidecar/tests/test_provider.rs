use std::time::Duration;

use assert_matches::assert_matches;
use dotlake_core::{BlockSource, SourceError};
use dotlake_sidecar::{SidecarError, SidecarProvider, SidecarProviderOptions};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn block(number: u64) -> serde_json::Value {
    json!({
        "number": number.to_string(),
        "hash": "0x9d",
        "parentHash": "0x8c",
        "stateRoot": "0x7b",
        "extrinsicsRoot": "0x6a",
        "authorId": "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5",
        "logs": [{ "type": "PreRuntime", "index": "6", "value": ["0x42414245", "0x00"] }],
        "onInitialize": { "events": [] },
        "extrinsics": [{
            "method": { "pallet": "timestamp", "method": "set" },
            "signature": null,
            "nonce": null,
            "args": { "now": "1700000000000" },
            "tip": null,
            "hash": "0x01",
            "info": {},
            "era": { "immortalEra": "0x00" },
            "events": [],
            "success": true,
            "paysFee": false
        }],
        "onFinalize": { "events": [] },
        "finalized": true
    })
}

fn new_provider(server: &MockServer) -> SidecarProvider {
    SidecarProvider::new(server.uri(), SidecarProviderOptions::default())
}

#[tokio::test]
async fn test_fetch_block() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/1234"))
        .respond_with(ResponseTemplate::new(200).set_body_json(block(1234)))
        .mount(&server)
        .await;

    let provider = new_provider(&server);
    let raw = provider.fetch_block(1234).await.unwrap();
    assert_eq!(raw.number, "1234");
    assert_eq!(raw.extrinsics.len(), 1);
    assert_eq!(raw.extrinsics[0].method.pallet, "timestamp");
}

#[tokio::test]
async fn test_head_number() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/head/header"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "parentHash": "0x8c",
            "number": "5678",
            "stateRoot": "0x7b",
            "extrinsicsRoot": "0x6a",
            "digest": { "logs": [] }
        })))
        .mount(&server)
        .await;

    let provider = new_provider(&server);
    assert_eq!(provider.head_number().await.unwrap(), 5678);
}

#[tokio::test]
async fn test_sends_configured_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/head/header"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "number": 9 })))
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", HeaderValue::from_static("secret"));
    let provider = SidecarProvider::new(
        server.uri(),
        SidecarProviderOptions {
            headers,
            ..Default::default()
        },
    );
    assert_eq!(provider.head_number().await.unwrap(), 9);
}

#[tokio::test]
async fn test_error_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocks/401"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocks/500"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocks/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = new_provider(&server);

    let err = provider.get_block(404).await.unwrap_err();
    assert_matches!(err.current_context(), SidecarError::NotFound);
    let err = provider.fetch_block(404).await.unwrap_err();
    assert_matches!(err.current_context(), SourceError::NotFound);
    assert!(err.current_context().is_transient());

    let err = provider.get_block(401).await.unwrap_err();
    assert_matches!(err.current_context(), SidecarError::Unauthorized);

    let err = provider.fetch_block(500).await.unwrap_err();
    assert_matches!(err.current_context(), SourceError::Unavailable);
    assert!(err.downcast_ref::<SidecarError>().is_some());

    let err = provider.fetch_block(7).await.unwrap_err();
    assert_matches!(err.current_context(), SourceError::InvalidResponse);
    assert!(!err.current_context().is_transient());
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocks/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(block(1))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let provider = SidecarProvider::new(
        server.uri(),
        SidecarProviderOptions {
            timeout: Duration::from_millis(100),
            ..Default::default()
        },
    );
    let err = provider.get_block(1).await.unwrap_err();
    assert_matches!(err.current_context(), SidecarError::Timeout);

    let err = provider.fetch_block(1).await.unwrap_err();
    assert_matches!(err.current_context(), SourceError::Unavailable);
}

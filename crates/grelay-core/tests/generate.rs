use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use grelay_common::GlobalConfig;
use grelay_core::{
    GenerateError, GenerateService, NoopUsageSink, Principal, SharedUsageSink, UpstreamClient,
    UpstreamFailure, UpstreamRequest, UpstreamResponse, UpstreamTransportErrorKind, UsageRecord,
    UsageSink,
};

#[derive(Default)]
struct MockUpstream {
    calls: AtomicUsize,
    requests: Mutex<Vec<UpstreamRequest>>,
    result: Mutex<Option<Result<UpstreamResponse, UpstreamFailure>>>,
}

impl MockUpstream {
    fn respond_with(status: u16, body: serde_json::Value) -> Arc<Self> {
        let mock = Self::default();
        *mock.result.lock().unwrap() = Some(Ok(UpstreamResponse {
            status,
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }));
        Arc::new(mock)
    }

    fn respond_with_raw(status: u16, body: &'static str) -> Arc<Self> {
        let mock = Self::default();
        *mock.result.lock().unwrap() = Some(Ok(UpstreamResponse {
            status,
            body: Bytes::from_static(body.as_bytes()),
        }));
        Arc::new(mock)
    }

    fn fail_with(kind: UpstreamTransportErrorKind, message: &str) -> Arc<Self> {
        let mock = Self::default();
        *mock.result.lock().unwrap() = Some(Err(UpstreamFailure {
            kind,
            message: message.to_string(),
        }));
        Arc::new(mock)
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> UpstreamRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl UpstreamClient for MockUpstream {
    fn send<'a>(
        &'a self,
        req: UpstreamRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamResponse, UpstreamFailure>> + Send + 'a>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        let result = self
            .result
            .lock()
            .unwrap()
            .clone()
            .expect("mock upstream has no queued result");
        Box::pin(async move { result })
    }
}

#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<UsageRecord>>,
}

impl RecordingSink {
    fn records(&self) -> Vec<UsageRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl UsageSink for RecordingSink {
    fn record(&self, record: UsageRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Sink whose underlying channel is already closed; every write fails and
/// is swallowed, the way the real bus-backed sink behaves after shutdown.
struct ClosedChannelSink {
    tx: tokio::sync::mpsc::Sender<UsageRecord>,
}

impl ClosedChannelSink {
    fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        drop(rx);
        Self { tx }
    }
}

impl UsageSink for ClosedChannelSink {
    fn record(&self, record: UsageRecord) {
        let _ = self.tx.try_send(record);
    }
}

fn test_config(upstream_api_key: Option<&str>) -> Arc<GlobalConfig> {
    Arc::new(GlobalConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        dsn: "sqlite::memory:".to_string(),
        upstream_base_url: "https://generativelanguage.googleapis.com".to_string(),
        upstream_api_key: upstream_api_key.map(str::to_string),
        model: "gemini-2.5-flash".to_string(),
        connect_timeout_secs: 5,
        request_timeout_secs: 120,
    })
}

fn service_with(
    upstream_api_key: Option<&str>,
    client: Arc<MockUpstream>,
    usage: SharedUsageSink,
) -> GenerateService {
    GenerateService::new(test_config(upstream_api_key), client, usage)
}

fn principal() -> Principal {
    Principal {
        user_id: "7".to_string(),
        key_id: 1,
    }
}

fn gemini_ok(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }], "role": "model" },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": { "promptTokenCount": 4, "candidatesTokenCount": 3, "totalTokenCount": 7 },
        "modelVersion": "gemini-2.5-flash"
    })
}

#[tokio::test]
async fn missing_principal_is_unauthenticated_and_skips_upstream() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let sink = Arc::new(RecordingSink::default());
    let service = service_with(Some("key"), upstream.clone(), sink.clone());

    let err = service
        .generate(None, br#"{"message":"Hello"}"#)
        .await
        .unwrap_err();

    assert_eq!(err, GenerateError::Unauthenticated);
    assert_eq!(err.kind(), "unauthenticated");
    assert_eq!(err.http_status(), 401);
    assert_eq!(upstream.call_count(), 0);
    assert!(sink.records().is_empty());
}

#[tokio::test]
async fn blank_message_is_invalid_argument_and_skips_upstream() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let service = service_with(Some("key"), upstream.clone(), Arc::new(NoopUsageSink));

    for raw in [
        br#"{"message":"   "}"#.as_slice(),
        br#"{"message":""}"#.as_slice(),
        br#"{}"#.as_slice(),
        br#"{"message":42}"#.as_slice(),
        b"not json".as_slice(),
    ] {
        let err = service
            .generate(Some(&principal()), raw)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(err.http_status(), 400);
    }

    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn parameters_default_individually_in_the_upstream_body() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let service = service_with(
        Some("secret-key"),
        upstream.clone(),
        Arc::new(NoopUsageSink),
    );

    service
        .generate(
            Some(&principal()),
            br#"{"message":"Hello","modelParameters":{"temperature":0.2,"topK":"forty"}}"#,
        )
        .await
        .unwrap();

    let request = upstream.last_request();
    assert!(
        request
            .url
            .ends_with("/v1beta/models/gemini-2.5-flash:generateContent")
    );
    assert!(
        request
            .headers
            .iter()
            .any(|(name, value)| name == "x-goog-api-key" && value == "secret-key")
    );

    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
    let config = &body["generationConfig"];
    assert_eq!(config["temperature"], serde_json::json!(0.2));
    assert_eq!(config["topK"], serde_json::json!(40));
    assert_eq!(config["topP"], serde_json::json!(0.95));
    assert_eq!(config["maxOutputTokens"], serde_json::json!(2048));
}

#[tokio::test]
async fn missing_credential_is_a_configuration_error_without_upstream_call() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let service = service_with(None, upstream.clone(), Arc::new(NoopUsageSink));

    let err = service
        .generate(Some(&principal()), br#"{"message":"Hello"}"#)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "internal");
    assert_eq!(err.to_string(), "service configuration error");
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn upstream_error_status_maps_to_internal_without_leaking() {
    let upstream =
        MockUpstream::respond_with(500, serde_json::json!({ "error": { "code": 500 } }));
    let service = service_with(Some("key"), upstream.clone(), Arc::new(NoopUsageSink));

    let err = service
        .generate(Some(&principal()), br#"{"message":"Hello"}"#)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "internal");
    assert_eq!(err.to_string(), "upstream request failed");
    // The upstream status lives in server-side diagnostics only.
    assert!(err.detail().unwrap().contains("500"));
    assert_eq!(upstream.call_count(), 1);
}

#[tokio::test]
async fn transport_failure_maps_to_internal() {
    let upstream = MockUpstream::fail_with(
        UpstreamTransportErrorKind::Timeout,
        "operation timed out",
    );
    let service = service_with(Some("key"), upstream.clone(), Arc::new(NoopUsageSink));

    let err = service
        .generate(Some(&principal()), br#"{"message":"Hello"}"#)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "internal");
    assert_eq!(err.to_string(), "upstream request failed");
    assert!(err.detail().unwrap().contains("timed out"));
}

#[tokio::test]
async fn empty_generation_is_internal_even_on_2xx() {
    for body in [
        serde_json::json!({ "candidates": [] }),
        serde_json::json!({}),
        serde_json::json!({ "candidates": [{ "finishReason": "SAFETY" }] }),
        serde_json::json!({ "candidates": [{ "content": { "parts": [] } }] }),
        serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": "" }] } }] }),
    ] {
        let upstream = MockUpstream::respond_with(200, body);
        let sink = Arc::new(RecordingSink::default());
        let service = service_with(Some("key"), upstream.clone(), sink.clone());

        let err = service
            .generate(Some(&principal()), br#"{"message":"Hello"}"#)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "internal");
        assert_eq!(err.to_string(), "empty response from AI service");
        assert!(sink.records().is_empty());
    }
}

#[tokio::test]
async fn undecodable_2xx_body_is_internal() {
    let upstream = MockUpstream::respond_with_raw(200, "not json at all");
    let service = service_with(Some("key"), upstream.clone(), Arc::new(NoopUsageSink));

    let err = service
        .generate(Some(&principal()), br#"{"message":"Hello"}"#)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "internal");
    assert_eq!(err.to_string(), "malformed upstream response");
}

#[tokio::test]
async fn success_passes_text_through_and_records_usage() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let sink = Arc::new(RecordingSink::default());
    let service = service_with(Some("key"), upstream.clone(), sink.clone());

    let out = service
        .generate(
            Some(&principal()),
            br#"{"message":"Hello","modelParameters":{}}"#,
        )
        .await
        .unwrap();

    assert_eq!(out.response, "Hi there");
    assert_eq!(out.model, "gemini-2.5-flash");
    assert_eq!(upstream.call_count(), 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, "7");
    assert_eq!(records[0].model, "gemini-2.5-flash");
    assert_eq!(records[0].message_chars, 5);
    assert_eq!(records[0].response_chars, 8);
}

#[tokio::test]
async fn usage_sink_failure_does_not_change_the_result() {
    let upstream = MockUpstream::respond_with(200, gemini_ok("Hi there"));
    let service = service_with(
        Some("key"),
        upstream.clone(),
        Arc::new(ClosedChannelSink::new()),
    );

    let out = service
        .generate(Some(&principal()), br#"{"message":"Hello"}"#)
        .await
        .unwrap();

    assert_eq!(out.response, "Hi there");
    assert_eq!(out.model, "gemini-2.5-flash");
}

//! Webhook event relay.
//!
//! Opens the organization's server-sent-event stream and re-posts every
//! delivered webhook to a local URL. Forwarding runs in spawned tasks so a
//! slow target never stalls the stream.

pub mod sse;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::api::read_json;
use crate::auth::{ExposeSecret, SecretString};
use crate::build_info;
use crate::error::{ApiError, ListenError};
use crate::ui::RenderSink;

use sse::{SseDecoder, SseEvent};

/// Headers that describe the original hop and must not be replayed.
const HOP_HEADERS: [&str; 5] = [
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "keep-alive",
];

/// Stream endpoint for one organization.
pub fn listen_url(api_base_url: &str, organization_id: &str) -> String {
    format!(
        "{}/v1/cli/listen/{organization_id}",
        api_base_url.trim_end_matches('/')
    )
}

/// Validate the forward target given on the command line.
pub fn parse_target(raw: &str) -> Result<Url, ListenError> {
    let url = Url::parse(raw.trim()).map_err(|_| ListenError::InvalidTarget(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ListenError::InvalidTarget(raw.to_string())),
    }
}

/// Stream acknowledgement sent right after connecting.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ListenAck {
    pub key: String,
    #[serde(default)]
    pub ts: Option<String>,
    pub secret: String,
}

/// One delivered webhook.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayedEvent {
    pub payload: RelayedPayload,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RelayedPayload {
    #[serde(default)]
    pub payload: Value,
}

/// Interpretation of one stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Connected(ListenAck),
    Event(RelayedEvent),
    Unparseable(String),
}

pub fn classify_message(data: &str) -> StreamMessage {
    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return StreamMessage::Unparseable(data.to_string());
    };
    if value.get("key").and_then(Value::as_str) == Some("connected") {
        if let Ok(ack) = serde_json::from_value::<ListenAck>(value.clone()) {
            return StreamMessage::Connected(ack);
        }
    }
    match serde_json::from_value::<RelayedEvent>(value) {
        Ok(event) => StreamMessage::Event(event),
        Err(_) => StreamMessage::Unparseable(data.to_string()),
    }
}

/// Relay settings for one `listen` session.
pub struct Relay {
    stream_http: reqwest::Client,
    forward_http: reqwest::Client,
    stream_url: String,
    token: SecretString,
    target: Url,
    sink: Arc<dyn RenderSink>,
}

impl Relay {
    /// `timeout` bounds connecting to the stream and each forward request;
    /// the stream itself stays open indefinitely.
    pub fn new(
        stream_url: String,
        token: SecretString,
        target: Url,
        timeout: Duration,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        let stream_http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(build_info::user_agent())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            stream_http,
            forward_http: crate::api::build_http_client(timeout),
            stream_url,
            token,
            target,
            sink,
        }
    }

    /// Relay events until the stream fails or closes.
    ///
    /// Always ends with an error: a relay has no natural end, so a closed
    /// stream is reported as [`ListenError::Stream`]. In-flight forwards are
    /// awaited before returning.
    pub async fn run(&self) -> Result<(), ListenError> {
        let response = self
            .stream_http
            .get(&self.stream_url)
            .header(ACCEPT, "text/event-stream")
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|err| ListenError::Connect(ApiError::from(err)))?;
        if !response.status().is_success() {
            // Reuse the JSON reader's status mapping; the body type is irrelevant.
            let err = read_json::<Value>(response)
                .await
                .err()
                .unwrap_or_else(|| ApiError::InvalidResponse("unexpected stream response".into()));
            return Err(ListenError::Connect(err));
        }
        info!(url = %self.stream_url, "event stream connected");

        let mut forwards = JoinSet::new();
        let mut decoder = SseDecoder::new();
        let mut body = response.bytes_stream();
        let outcome = loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    for event in decoder.push(&chunk) {
                        self.dispatch(event, &mut forwards);
                    }
                    while forwards.try_join_next().is_some() {}
                }
                Some(Err(err)) => break ListenError::Stream(err.to_string()),
                None => {
                    if let Some(event) = decoder.finish() {
                        self.dispatch(event, &mut forwards);
                    }
                    break ListenError::Stream("event stream closed by server".to_string());
                }
            }
        };

        while let Some(joined) = forwards.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "forward task aborted");
            }
        }
        Err(outcome)
    }

    fn dispatch(&self, event: SseEvent, forwards: &mut JoinSet<()>) {
        match classify_message(&event.data) {
            StreamMessage::Connected(ack) => {
                self.sink.section("connected to event stream");
                self.sink.field("webhook secret", &ack.secret);
            }
            StreamMessage::Event(event) => {
                debug!(headers = event.headers.len(), "relaying event");
                let http = self.forward_http.clone();
                let target = self.target.clone();
                let sink = Arc::clone(&self.sink);
                forwards.spawn(async move {
                    forward_event(&http, &target, &event, sink.as_ref()).await;
                });
            }
            StreamMessage::Unparseable(data) => {
                self.sink.warn(&format!("Failed to parse event: {data}"));
            }
        }
    }
}

/// POST one event to the target and report the outcome.
pub async fn forward_event(
    http: &reqwest::Client,
    target: &Url,
    event: &RelayedEvent,
    sink: &dyn RenderSink,
) {
    let body = match serde_json::to_vec(&event.payload.payload) {
        Ok(body) => body,
        Err(err) => {
            sink.forward_result(&format!("Failed to forward event: {err}"), false);
            return;
        }
    };
    let result = http
        .post(target.clone())
        .headers(forward_headers(&event.headers))
        .body(body)
        .send()
        .await;
    match result {
        Ok(response) => {
            let status = response.status();
            let reason = status.canonical_reason().unwrap_or_default();
            sink.forward_result(
                format!("{} {reason}", status.as_u16()).trim_end(),
                status.is_success(),
            );
        }
        Err(err) => sink.forward_result(&format!("Failed to forward event: {err}"), false),
    }
}

/// Copy event headers, dropping hop-by-hop and invalid ones.
fn forward_headers(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid forwarded header"),
        }
    }
    if !map.contains_key(CONTENT_TYPE) {
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{sse_data_block, MockHttpServer, MockResponse, RecordingSink};

    #[test]
    fn listen_url_appends_organization() {
        assert_eq!(
            listen_url("https://sandbox-api.polar.sh/", "org_1"),
            "https://sandbox-api.polar.sh/v1/cli/listen/org_1"
        );
    }

    #[test]
    fn target_must_be_absolute_http_url() {
        assert!(parse_target("http://localhost:3000/webhooks").is_ok());
        assert!(matches!(
            parse_target("localhost:3000"),
            Err(ListenError::InvalidTarget(_))
        ));
        assert!(matches!(
            parse_target("ftp://example.com/hook"),
            Err(ListenError::InvalidTarget(_))
        ));
    }

    #[test]
    fn classify_distinguishes_ack_events_and_garbage() {
        let ack = classify_message(r#"{"key":"connected","ts":"2024-01-01T00:00:00Z","secret":"whsec"}"#);
        assert!(matches!(ack, StreamMessage::Connected(ListenAck { ref secret, .. }) if secret == "whsec"));

        let event = classify_message(
            r#"{"payload":{"payload":{"type":"order.created"}},"headers":{"webhook-id":"1"}}"#,
        );
        let StreamMessage::Event(event) = event else {
            panic!("expected event");
        };
        assert_eq!(event.payload.payload["type"], "order.created");
        assert_eq!(event.headers.get("webhook-id").map(String::as_str), Some("1"));

        assert_eq!(
            classify_message("not json"),
            StreamMessage::Unparseable("not json".to_string())
        );
        assert!(matches!(classify_message("[1,2]"), StreamMessage::Unparseable(_)));
    }

    #[test]
    fn forward_headers_drop_hop_headers_and_default_content_type() {
        let headers = HashMap::from([
            ("Host".to_string(), "api.polar.sh".to_string()),
            ("Content-Length".to_string(), "99".to_string()),
            ("webhook-signature".to_string(), "v1,abc".to_string()),
            ("bad header".to_string(), "x".to_string()),
        ]);
        let map = forward_headers(&headers);
        assert!(map.get("host").is_none());
        assert!(map.get("content-length").is_none());
        assert_eq!(map.get("webhook-signature").unwrap(), "v1,abc");
        assert_eq!(map.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(map.len(), 2);
    }

    #[tokio::test]
    async fn relay_forwards_events_and_reports_stream_end() {
        let target = MockHttpServer::start(|_| MockResponse::json(202, "")).await;
        let stream_body = format!(
            "{}{}{}",
            sse_data_block(r#"{"key":"connected","ts":"2024-01-01T00:00:00Z","secret":"whsec_test"}"#),
            sse_data_block("{broken"),
            sse_data_block(
                r#"{"payload":{"payload":{"type":"checkout.created","data":{"id":"c1"}}},"headers":{"webhook-id":"evt_1","content-type":"application/json"}}"#
            ),
        );
        let stream = MockHttpServer::start(move |_| {
            MockResponse::json(200, stream_body.clone())
                .with_header("Content-Type", "text/event-stream")
        })
        .await;

        let sink = Arc::new(RecordingSink::default());
        let relay = Relay::new(
            listen_url(&stream.base_url(), "org_1"),
            SecretString::new("polar-token".to_string()),
            parse_target(&target.url("/webhooks")).unwrap(),
            Duration::from_secs(5),
            sink.clone(),
        );
        let err = relay.run().await.unwrap_err();
        assert!(matches!(err, ListenError::Stream(_)), "{err}");

        let opened = stream.requests();
        assert_eq!(opened[0].target, "/v1/cli/listen/org_1");
        assert_eq!(opened[0].header("authorization"), Some("Bearer polar-token"));
        assert_eq!(opened[0].header("accept"), Some("text/event-stream"));

        let forwarded = target.requests();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].method, "POST");
        assert_eq!(forwarded[0].target, "/webhooks");
        assert_eq!(forwarded[0].header("webhook-id"), Some("evt_1"));
        assert_eq!(
            forwarded[0].json(),
            serde_json::json!({"type":"checkout.created","data":{"id":"c1"}})
        );

        assert!(sink.contains("field: webhook secret: whsec_test"));
        assert!(sink.contains("warning: Failed to parse event: {broken"));
        assert!(sink.contains(">> 202 Accepted (ok)"));
    }

    #[tokio::test]
    async fn rejected_stream_is_a_connect_error() {
        let stream = MockHttpServer::start(|_| MockResponse::json(401, r#"{"detail":"expired"}"#)).await;
        let relay = Relay::new(
            listen_url(&stream.base_url(), "org_1"),
            SecretString::new("stale".to_string()),
            parse_target("http://127.0.0.1:9/hook").unwrap(),
            Duration::from_secs(5),
            Arc::new(RecordingSink::default()),
        );
        let err = relay.run().await.unwrap_err();
        match err {
            ListenError::Connect(inner) => assert_eq!(inner.status_code(), Some(401)),
            other => panic!("expected connect error, got {other}"),
        }
    }

    #[tokio::test]
    async fn unreachable_target_is_reported_not_fatal() {
        let sink = RecordingSink::default();
        let port = crate::testsupport::free_loopback_port();
        let target = parse_target(&format!("http://127.0.0.1:{port}/hook")).unwrap();
        let event = RelayedEvent {
            payload: RelayedPayload {
                payload: serde_json::json!({"ok": true}),
            },
            headers: HashMap::new(),
        };
        forward_event(
            &crate::api::build_http_client(Duration::from_secs(2)),
            &target,
            &event,
            &sink,
        )
        .await;
        assert!(sink.contains("Failed to forward event"));
        assert!(sink.contains("(failed)"));
    }
}

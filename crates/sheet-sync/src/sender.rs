//! Posting grids to a spreadsheet-writing endpoint.
//!
//! [`SheetsSender`] checks preconditions, formats the record and hands a
//! [`WriteRequest`] to a [`SheetsTransport`]. The HTTP transport issues a
//! single POST per write: no retry, no timeout, no idempotency key.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::format::DataFormatter;
use crate::types::{
    EndpointReply, EndpointStatus, SyncError, SyncResult, SyncTarget, WriteRequest,
    DEFAULT_RANGE, DEFAULT_SHEET_NAME,
};

/// Carries write requests to an endpoint and returns its JSON reply.
#[async_trait]
pub trait SheetsTransport: Send + Sync {
    /// Deliver a write request; returns the parsed response body.
    async fn post_write(&self, request: &WriteRequest) -> SyncResult<Value>;

    /// Fetch the endpoint's liveness payload.
    async fn get_status(&self) -> SyncResult<Value>;
}

/// HTTP transport wrapping reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport posting to `endpoint`.
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sheet-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl SheetsTransport for HttpTransport {
    async fn post_write(&self, request: &WriteRequest) -> SyncResult<Value> {
        tracing::debug!(
            "POST {} sheet_id={} sheet_name={} range={} rows={}",
            self.endpoint,
            request.sheet_id,
            request.sheet_name,
            request.range,
            request.data.row_count()
        );
        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| SyncError::TransportFailure(e.to_string()))?;
        read_json_body(resp).await
    }

    async fn get_status(&self) -> SyncResult<Value> {
        let resp = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| SyncError::TransportFailure(e.to_string()))?;
        read_json_body(resp).await
    }
}

/// Parse a response body as JSON regardless of the status code; the
/// endpoint reports failures inside the body.
async fn read_json_body(resp: reqwest::Response) -> SyncResult<Value> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| SyncError::TransportFailure(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| {
        SyncError::TransportFailure(format!("invalid JSON response (HTTP {status}): {e}"))
    })
}

/// True for values that carry nothing to write: `null`, `{}`, `[]` and `""`.
pub fn is_empty_record(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Sends records to a spreadsheet endpoint.
#[derive(Clone)]
pub struct SheetsSender {
    transport: Arc<dyn SheetsTransport>,
}

impl SheetsSender {
    pub fn new(transport: Arc<dyn SheetsTransport>) -> Self {
        Self { transport }
    }

    /// Sender posting over HTTP to `endpoint`.
    pub fn http(endpoint: &str) -> Self {
        Self::new(Arc::new(HttpTransport::new(endpoint)))
    }

    /// Format `data` and write it to `sheet_name` of spreadsheet `sheet_id`,
    /// starting at the top-left cell of `range`.
    ///
    /// An empty `sheet_name` or `range` falls back to `Sheet1` / `A1`.
    /// Preconditions are checked before the transport is touched.
    pub async fn send(
        &self,
        data: &Value,
        sheet_id: &str,
        sheet_name: &str,
        range: &str,
    ) -> SyncResult<EndpointReply> {
        if is_empty_record(data) {
            tracing::warn!("refusing to send: no data");
            return Err(SyncError::EmptyData);
        }
        if sheet_id.trim().is_empty() {
            tracing::warn!("refusing to send: no spreadsheet id");
            return Err(SyncError::MissingSheetId);
        }

        let grid = DataFormatter::format(data);
        if grid.is_empty() {
            tracing::warn!("refusing to send: record formatted to an empty grid");
            return Err(SyncError::EmptyData);
        }

        let request = WriteRequest {
            sheet_id: sheet_id.to_string(),
            sheet_name: non_empty_or(sheet_name, DEFAULT_SHEET_NAME),
            range: non_empty_or(range, DEFAULT_RANGE),
            data: grid,
        };

        let body = self.transport.post_write(&request).await.map_err(|e| {
            tracing::warn!("write to sheet {} failed: {e}", request.sheet_id);
            e
        })?;

        match body.get("success").and_then(Value::as_bool) {
            Some(true) => {
                tracing::info!(
                    "wrote {} row(s) to {}!{}",
                    request.data.row_count(),
                    request.sheet_name,
                    request.range
                );
                Ok(EndpointReply::new(body))
            }
            _ => {
                let message = body
                    .get("error")
                    .and_then(Value::as_str)
                    .or_else(|| body.get("message").and_then(Value::as_str))
                    .unwrap_or("endpoint did not report success")
                    .to_string();
                tracing::warn!("endpoint rejected write to {}: {message}", request.sheet_id);
                Err(SyncError::RemoteRejected(message))
            }
        }
    }

    /// [`send`](Self::send) using the sheet fields of a target.
    pub async fn send_to(&self, data: &Value, target: &SyncTarget) -> SyncResult<EndpointReply> {
        self.send(data, &target.sheet_id, &target.sheet_name, &target.range)
            .await
    }

    /// Fetch the endpoint's liveness payload.
    pub async fn status(&self) -> SyncResult<EndpointStatus> {
        let body = self.transport.get_status().await?;
        serde_json::from_value(body)
            .map_err(|e| SyncError::TransportFailure(format!("unexpected status payload: {e}")))
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SyncOutcome;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-process transport recording every request it receives.
    struct RecordingTransport {
        reply: Value,
        requests: Mutex<Vec<WriteRequest>>,
    }

    impl RecordingTransport {
        fn replying(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SheetsTransport for RecordingTransport {
        async fn post_write(&self, request: &WriteRequest) -> SyncResult<Value> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }

        async fn get_status(&self) -> SyncResult<Value> {
            Ok(json!({"status": "online"}))
        }
    }

    #[tokio::test]
    async fn test_missing_sheet_id_makes_no_call() {
        let transport = RecordingTransport::replying(json!({"success": true}));
        let sender = SheetsSender::new(transport.clone());

        let result = sender.send(&json!({"a": 1}), "", "Sheet1", "A1").await;
        assert_eq!(result, Err(SyncError::MissingSheetId));
        assert_eq!(SyncOutcome::from(result).error.as_deref(), Some("MissingSheetId"));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_data_makes_no_call() {
        let transport = RecordingTransport::replying(json!({"success": true}));
        let sender = SheetsSender::new(transport.clone());

        for data in [json!([]), json!({}), Value::Null, json!("")] {
            let result = sender.send(&data, "sheet123", "Sheet1", "A1").await;
            assert_eq!(result, Err(SyncError::EmptyData));
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_data_checked_before_sheet_id() {
        let transport = RecordingTransport::replying(json!({"success": true}));
        let sender = SheetsSender::new(transport);
        let result = sender.send(&json!([]), "", "Sheet1", "A1").await;
        assert_eq!(result, Err(SyncError::EmptyData));
    }

    #[tokio::test]
    async fn test_grid_with_empty_first_row_rejected() {
        let transport = RecordingTransport::replying(json!({"success": true}));
        let sender = SheetsSender::new(transport.clone());
        let result = sender.send(&json!([[]]), "sheet123", "Sheet1", "A1").await;
        assert_eq!(result, Err(SyncError::EmptyData));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_formats_and_fills_defaults() {
        let transport = RecordingTransport::replying(json!({"success": true}));
        let sender = SheetsSender::new(transport.clone());

        sender.send(&json!({"a": 1, "b": 2}), "sheet123", "", "").await.unwrap();

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].sheet_name, "Sheet1");
        assert_eq!(requests[0].range, "A1");
        assert_eq!(
            serde_json::to_value(&requests[0].data).unwrap(),
            json!([["a", "b"], [1, 2]])
        );
    }

    #[tokio::test]
    async fn test_http_remote_rejection_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "boom"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sender = SheetsSender::http(&format!("{}/exec", server.uri()));
        let result = sender.send(&json!({"a": 1}), "sheet123", "Sheet1", "A1").await;
        assert_eq!(result, Err(SyncError::RemoteRejected("boom".into())));

        let outcome = SyncOutcome::from(result);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_http_posts_expected_body() {
        let server = MockServer::start().await;
        let reply = json!({
            "success": true,
            "message": "saved",
            "updatedRange": "Log!A1:B2",
            "rowsUpdated": 2,
            "columnsUpdated": 2
        });
        Mock::given(method("POST"))
            .and(body_json(json!({
                "sheetId": "sheet123",
                "sheetName": "Log",
                "range": "A1",
                "data": [["a", "b"], [1, 2]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let sender = SheetsSender::http(&server.uri());
        let reply_got = sender
            .send(&json!({"a": 1, "b": 2}), "sheet123", "Log", "A1")
            .await
            .unwrap();
        assert_eq!(reply_got.body(), &reply);
        assert_eq!(reply_got.updated_range(), Some("Log!A1:B2"));
        assert_eq!(reply_got.rows_updated(), Some(2));
    }

    #[tokio::test]
    async fn test_http_precondition_failure_never_reaches_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(0)
            .mount(&server)
            .await;

        let sender = SheetsSender::http(&server.uri());
        assert_eq!(
            sender.send(&json!({"a": 1}), "  ", "Sheet1", "A1").await,
            Err(SyncError::MissingSheetId)
        );
        assert_eq!(
            sender.send(&json!([]), "sheet123", "Sheet1", "A1").await,
            Err(SyncError::EmptyData)
        );
    }

    #[tokio::test]
    async fn test_http_non_json_body_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let sender = SheetsSender::http(&server.uri());
        let err = sender
            .send(&json!({"a": 1}), "sheet123", "Sheet1", "A1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TransportFailure");
        assert!(err.outcome_message().contains("502"));
    }

    #[tokio::test]
    async fn test_http_unreachable_endpoint_is_transport_failure() {
        // Port 9 (discard) on localhost is not listening in test environments.
        let sender = SheetsSender::http("http://127.0.0.1:9/exec");
        let err = sender
            .send(&json!({"a": 1}), "sheet123", "Sheet1", "A1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TransportFailure");
    }

    #[tokio::test]
    async fn test_missing_success_flag_is_rejection() {
        let transport = RecordingTransport::replying(json!({"ok": true}));
        let sender = SheetsSender::new(transport);
        let err = sender
            .send(&json!({"a": 1}), "sheet123", "Sheet1", "A1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::RemoteRejected("endpoint did not report success".into())
        );
    }

    #[tokio::test]
    async fn test_status_reads_liveness() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "online",
                "message": "ready",
                "timestamp": "2026-01-01T00:00:00Z"
            })))
            .mount(&server)
            .await;

        let status = SheetsSender::http(&server.uri()).status().await.unwrap();
        assert_eq!(status.status, "online");
        assert_eq!(status.message, "ready");
    }
}

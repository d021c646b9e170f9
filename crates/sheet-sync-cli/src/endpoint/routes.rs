//! HTTP routes of the reference endpoint.
//!
//! Write failures are reported in the body as `{success: false, error}` with
//! HTTP 200, the way a script endpoint answers. Clients decide on `success`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use sheet_sync::{Cell, DEFAULT_RANGE};

use super::book::SheetBook;

/// Body of a write request. Every field is optional so that missing ones can
/// be reported in the endpoint's own error format.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WriteBody {
    sheet_id: Option<String>,
    sheet_name: Option<String>,
    range: Option<String>,
    data: Option<Value>,
}

/// Build the endpoint router around `book`.
pub fn router(book: Arc<SheetBook>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_status).post(handle_write))
        .route("/health", get(handle_health))
        .route("/spreadsheets/:id/sheets/:name", get(handle_read))
        .layer(cors)
        .with_state(book)
}

fn failure(error: impl Into<String>) -> Json<Value> {
    Json(json!({"success": false, "error": error.into()}))
}

async fn handle_write(State(book): State<Arc<SheetBook>>, body: String) -> Json<Value> {
    let body: WriteBody = match serde_json::from_str(&body) {
        Ok(b) => b,
        Err(e) => return failure(format!("Invalid JSON body: {e}")),
    };

    let sheet_id = match body.sheet_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return failure("Missing sheetId"),
    };
    let rows = match body.data {
        None | Some(Value::Null) => return failure("Missing data"),
        Some(Value::Array(rows)) => rows.iter().map(row_cells).collect::<Vec<_>>(),
        Some(_) => return failure("data must be an array of rows"),
    };
    let range = body
        .range
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_RANGE.to_string());

    match book
        .write(&sheet_id, body.sheet_name.as_deref(), &range, rows)
        .await
    {
        Ok(summary) => {
            tracing::info!(
                "wrote {}x{} to {} ({})",
                summary.rows_updated,
                summary.columns_updated,
                summary.updated_range,
                sheet_id
            );
            Json(json!({
                "success": true,
                "message": format!("Data written to {} successfully", summary.sheet_name),
                "updatedRange": summary.updated_range,
                "rowsUpdated": summary.rows_updated,
                "columnsUpdated": summary.columns_updated,
            }))
        }
        Err(e) => {
            tracing::warn!("write to {sheet_id} rejected: {e}");
            failure(e.to_string())
        }
    }
}

/// A row that is not an array is a single cell.
fn row_cells(row: &Value) -> Vec<Cell> {
    match row {
        Value::Array(cells) => cells.iter().map(Cell::from_value).collect(),
        other => vec![Cell::from_value(other)],
    }
}

async fn handle_status() -> Json<Value> {
    Json(json!({
        "status": "online",
        "message": "Sheets endpoint is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn handle_health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn handle_read(
    State(book): State<Arc<SheetBook>>,
    Path((id, name)): Path<(String, String)>,
) -> Response {
    match book.read(&id, &name).await {
        Ok(values) => Json(json!({
            "success": true,
            "sheetId": id,
            "sheetName": name,
            "values": values,
        }))
        .into_response(),
        Err(e) => (StatusCode::NOT_FOUND, failure(e.to_string())).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use tower::ServiceExt;

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_back() {
        let book = Arc::new(SheetBook::open());
        let (status, reply) = call(
            router(book.clone()),
            post(json!({
                "sheetId": "s1",
                "sheetName": "Log",
                "range": "A1",
                "data": [["a", "b"], [1, 2]]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["success"], true);
        assert_eq!(reply["updatedRange"], "Log!A1:B2");
        assert_eq!(reply["rowsUpdated"], 2);
        assert_eq!(reply["columnsUpdated"], 2);

        let (status, read) = call(router(book), get_req("/spreadsheets/s1/sheets/Log")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["values"], json!([["a", "b"], [1, 2]]));
    }

    #[tokio::test]
    async fn test_missing_fields_reported_in_body() {
        let book = Arc::new(SheetBook::open());

        let (status, reply) = call(router(book.clone()), post(json!({"data": [["a"]]}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply, json!({"success": false, "error": "Missing sheetId"}));

        let (_, reply) = call(router(book.clone()), post(json!({"sheetId": "s1"}))).await;
        assert_eq!(reply["error"], "Missing data");

        let (_, reply) = call(router(book.clone()), post(json!({"sheetId": "s1", "data": []}))).await;
        assert_eq!(reply["success"], false);

        let (_, reply) = call(router(book), post(json!({"sheetId": "s1", "data": {"a": 1}}))).await;
        assert_eq!(reply["error"], "data must be an array of rows");
    }

    #[tokio::test]
    async fn test_plain_text_body_is_accepted() {
        let book = Arc::new(SheetBook::open());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(r#"{"sheetId":"s1","data":[["x"]]}"#))
            .unwrap();
        let (_, reply) = call(router(book), request).await;
        assert_eq!(reply["success"], true);
        assert_eq!(reply["updatedRange"], "Sheet1!A1:A1");
    }

    #[tokio::test]
    async fn test_malformed_json_is_failure() {
        let book = Arc::new(SheetBook::open());
        let request = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from("{nope"))
            .unwrap();
        let (status, reply) = call(router(book), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["success"], false);
    }

    #[tokio::test]
    async fn test_range_past_sheet_limits_is_failure() {
        let book = Arc::new(SheetBook::open());
        let (status, reply) = call(
            router(book.clone()),
            post(json!({"sheetId": "s1", "range": "A200000000", "data": [["a"]]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            reply,
            json!({"success": false, "error": "Invalid range: A200000000"})
        );

        let (_, reply) = call(
            router(book.clone()),
            post(json!({"sheetId": "s1", "range": "A4294967295", "data": [["a"], ["b"]]})),
        )
        .await;
        assert_eq!(reply["success"], false);
        assert!(book.sheet_names("s1").await.is_none());
    }

    #[tokio::test]
    async fn test_status_and_health() {
        let book = Arc::new(SheetBook::open());
        let (_, status) = call(router(book.clone()), get_req("/")).await;
        assert_eq!(status["status"], "online");
        assert!(status["timestamp"].is_string());

        let (_, health) = call(router(book), get_req("/health")).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_unknown_sheet_is_not_found() {
        let book = Arc::new(SheetBook::open());
        let (status, reply) = call(router(book), get_req("/spreadsheets/none/sheets/Sheet1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(reply["success"], false);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let book = Arc::new(SheetBook::open());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router(book).oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }
}

//! Local HTTP server the request pipeline is exercised against.
//!
//! Besides a small in-memory item store, it exposes fixed routes that produce
//! each kind of response the client has to cope with: JSON, text, bytes that
//! are not UTF-8, arbitrary status codes, a redirect, and a request that is
//! never answered.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

/// Bytes that are not valid UTF-8, served as `text/plain`.
pub const INVALID_UTF8: &[u8] = &[0x66, 0x6f, 0xff, 0xfe, 0x6f];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub done: bool,
}

#[derive(Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Deserialize)]
pub struct PatchItem {
    pub name: Option<String>,
    pub done: Option<bool>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Item>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/items", get(list_items).post(create_item))
        .route(
            "/items/{id}",
            get(get_item)
                .put(replace_item)
                .patch(patch_item)
                .delete(delete_item),
        )
        .route("/json", get(json_document))
        .route("/text", get(text_document))
        .route("/bytes", any(invalid_utf8))
        .route("/status/{code}", any(status))
        .route("/redirect", get(redirect))
        .route("/echo", any(echo))
        .route("/hang", any(hang))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock server listening");
    }
    axum::serve(listener, app()).await
}

fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "item not found" })),
    )
}

async fn list_items(State(db): State<Db>) -> Json<Vec<Item>> {
    let items = db.read().await;
    Json(items.values().cloned().collect())
}

async fn create_item(
    State(db): State<Db>,
    Json(input): Json<CreateItem>,
) -> (StatusCode, Json<Item>) {
    let item = Item {
        id: Uuid::new_v4(),
        name: input.name,
        done: input.done,
    };
    debug!(id = %item.id, "created item");
    db.write().await.insert(item.id, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn get_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<Json<Item>, (StatusCode, Json<Value>)> {
    let items = db.read().await;
    items.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn replace_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateItem>,
) -> Result<Json<Item>, (StatusCode, Json<Value>)> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or_else(not_found)?;
    item.name = input.name;
    item.done = input.done;
    Ok(Json(item.clone()))
}

async fn patch_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<PatchItem>,
) -> Result<Json<Item>, (StatusCode, Json<Value>)> {
    let mut items = db.write().await;
    let item = items.get_mut(&id).ok_or_else(not_found)?;
    if let Some(name) = input.name {
        item.name = name;
    }
    if let Some(done) = input.done {
        item.done = done;
    }
    Ok(Json(item.clone()))
}

async fn delete_item(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    let mut items = db.write().await;
    items
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

async fn json_document() -> Json<Value> {
    Json(json!({ "a": 1 }))
}

async fn text_document() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], "hello")
}

async fn invalid_utf8() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], INVALID_UTF8)
}

/// Respond with the requested status and a JSON body describing it.
async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    match StatusCode::from_u16(code) {
        Ok(status) if status.as_u16() >= 200 => (
            status,
            Json(json!({
                "status": code,
                "message": status.canonical_reason().unwrap_or("unknown status"),
            })),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("unsupported status code {code}") })),
        ),
    }
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, "/json")])
}

/// Describe the request back to the caller.
async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    Json(json!({
        "method": method.as_str(),
        "content_type": content_type,
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn hang() -> StatusCode {
    std::future::pending::<()>().await;
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_serializes_to_json() {
        let item = Item {
            id: Uuid::nil(),
            name: "Test".to_string(),
            done: false,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Test");
        assert_eq!(json["done"], false);
    }

    #[test]
    fn create_item_defaults_done_to_false() {
        let input: CreateItem = serde_json::from_str(r#"{"name":"No done field"}"#).unwrap();
        assert_eq!(input.name, "No done field");
        assert!(!input.done);
    }

    #[test]
    fn create_item_rejects_missing_name() {
        let result: Result<CreateItem, _> = serde_json::from_str(r#"{"done":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn patch_item_all_fields_optional() {
        let input: PatchItem = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.name.is_none());
        assert!(input.done.is_none());
    }

    #[test]
    fn invalid_utf8_constant_is_invalid() {
        assert!(std::str::from_utf8(INVALID_UTF8).is_err());
    }
}

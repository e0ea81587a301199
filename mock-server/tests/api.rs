use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Item, INVALID_UTF8};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

// --- fixed documents ---

#[tokio::test]
async fn json_route_serves_json() {
    let resp = app().oneshot(empty_request("GET", "/json")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[http::header::CONTENT_TYPE],
        "application/json"
    );
    let body: Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({"a": 1}));
}

#[tokio::test]
async fn text_route_serves_utf8_text() {
    let resp = app().oneshot(empty_request("GET", "/text")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, "hello");
}

#[tokio::test]
async fn bytes_route_serves_invalid_utf8_as_text() {
    let resp = app().oneshot(empty_request("PUT", "/bytes")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers()[http::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(body_bytes(resp).await.as_ref(), INVALID_UTF8);
}

// --- status and redirect ---

#[tokio::test]
async fn status_route_returns_requested_code() {
    for (method, code) in [("GET", 200), ("POST", 404), ("DELETE", 503)] {
        let resp = app()
            .oneshot(empty_request(method, &format!("/status/{code}")))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), code);
        let body: Value = body_json(resp).await;
        assert_eq!(body["status"], code);
    }
}

#[tokio::test]
async fn status_route_rejects_informational_and_invalid_codes() {
    for code in ["100", "1000", "abc"] {
        let resp = app()
            .oneshot(empty_request("GET", &format!("/status/{code}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn redirect_points_at_json() {
    let resp = app().oneshot(empty_request("GET", "/redirect")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(resp.headers()[http::header::LOCATION], "/json");
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_method_content_type_and_body() {
    let resp = app()
        .oneshot(json_request("PATCH", "/echo", r#"{"x":true}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "PATCH");
    assert_eq!(body["content_type"], "application/json");
    assert_eq!(body["body"], r#"{"x":true}"#);
}

#[tokio::test]
async fn echo_without_body() {
    let resp = app().oneshot(empty_request("DELETE", "/echo")).await.unwrap();

    let body: Value = body_json(resp).await;
    assert_eq!(body["method"], "DELETE");
    assert!(body["content_type"].is_null());
    assert_eq!(body["body"], "");
}

// --- item store ---

#[tokio::test]
async fn create_item_returns_201() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"name":"Buy milk"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let item: Item = body_json(resp).await;
    assert_eq!(item.name, "Buy milk");
    assert!(!item.done);
}

#[tokio::test]
async fn create_item_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/items", r#"{"not_name":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_item_is_404_with_error_detail() {
    let resp = app()
        .oneshot(empty_request(
            "GET",
            "/items/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = body_json(resp).await;
    assert_eq!(body["error"], "item not found");
}

#[tokio::test]
async fn item_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/items", r#"{"name":"Walk dog"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Item = body_json(resp).await;
    let id = created.id;

    // patch only touches the fields present
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PATCH",
            &format!("/items/{id}"),
            r#"{"done":true}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let patched: Item = body_json(resp).await;
    assert_eq!(patched.name, "Walk dog");
    assert!(patched.done);

    // put replaces the whole item
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            "PUT",
            &format!("/items/{id}"),
            r#"{"name":"Walk cat"}"#,
        ))
        .await
        .unwrap();
    let replaced: Item = body_json(resp).await;
    assert_eq!(replaced.name, "Walk cat");
    assert!(!replaced.done);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/items"))
        .await
        .unwrap();
    let items: Vec<Item> = body_json(resp).await;
    assert_eq!(items, vec![replaced]);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/items/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/items/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

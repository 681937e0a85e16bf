use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use book_catalog::{AppConfig, AppState, InMemoryRepository, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

// --- Test Harness ---

/// Router plus a bearer header for the mutating routes.
struct TestApp {
    router: Router,
    bearer: String,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::new(Arc::new(InMemoryRepository::new()), AppConfig::default());
        let token = state.tokens.generate_access_token(1, "admin").unwrap();
        TestApp {
            router: create_router(state),
            bearer: format!("Bearer {token}"),
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, &self.bearer);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body.to_string())).await
    }

    async fn patch(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(body.to_string())).await
    }

    /// Seeds Tolstoy, a Novel genre and War and Peace; returns the book id.
    async fn seed_book(&self) -> i64 {
        let (status, author) = self.post("/authors", json!({"author": "Leo Tolstoy"})).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, genre) = self.post("/genres", json!({"genre": "Novel"})).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, book) = self
            .post(
                "/books",
                json!({
                    "name": "War and Peace",
                    "author_id": author["id"],
                    "genre_id": genre["id"],
                    "price": 1000
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        book["id"].as_i64().unwrap()
    }
}

fn assert_validation_error(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// --- End to End ---

#[tokio::test]
async fn test_catalog_lifecycle() {
    let app = TestApp::new();
    let id = app.seed_book().await;

    let (status, book) = app.patch(&format!("/books?id={id}"), r#"{"price": 999}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["price"], 999);
    assert_eq!(book["name"], "War and Peace");

    let (status, book) = app.get(&format!("/books?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["price"], 999);
    assert_eq!(book["name"], "War and Peace");

    let (status, rows) = app.get("/books/withauthors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows[0]["author_name"], "Leo Tolstoy");
    assert_eq!(rows[0]["price"], 999);

    let (status, authors) = app.get("/authors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(authors, json!([{"id": 1, "author": "Leo Tolstoy"}]));

    let (status, genres) = app.get("/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(genres, json!([{"id": 1, "genre": "Novel"}]));
}

#[tokio::test]
async fn test_delete_book() {
    let app = TestApp::new();
    let id = app.seed_book().await;

    let (status, _) = app.call(Method::DELETE, &format!("/books?id={id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/books?id={id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    // Deleting again is still a success.
    let (status, _) = app.call(Method::DELETE, &format!("/books?id={id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Malformed Input ---

#[tokio::test]
async fn test_malformed_book_payload_creates_nothing() {
    let app = TestApp::new();
    app.seed_book().await;

    let bad_bodies = [
        r#"{"name": "Anna Karenina", "author_id": "1", "genre_id": 1, "price": 500}"#,
        r#"{"name": "Anna Karenina", "author_id": 1, "genre_id": 1}"#,
        r#"{"name": "Anna Karenina", "author_id": 1, "#,
        "not json at all",
    ];

    for raw in bad_bodies {
        let (status, body) = app.call(Method::POST, "/books", Some(raw.to_string())).await;
        assert_validation_error(status, &body);
    }

    let (_, books) = app.get("/books").await;
    assert_eq!(books.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_content_type_is_bad_request() {
    let app = TestApp::new();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/authors")
        .body(Body::from(r#"{"author": "Anton Chekhov"}"#))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_book_fields_are_rejected() {
    let app = TestApp::new();
    app.seed_book().await;

    let cases = [
        json!({"name": "  ", "author_id": 1, "genre_id": 1, "price": 10}),
        json!({"name": "Resurrection", "author_id": 0, "genre_id": 1, "price": 10}),
        json!({"name": "Resurrection", "author_id": 1, "genre_id": -1, "price": 10}),
        json!({"name": "Resurrection", "author_id": 1, "genre_id": 1, "price": -10}),
        // Unknown author
        json!({"name": "Resurrection", "author_id": 42, "genre_id": 1, "price": 10}),
    ];

    for payload in cases {
        let (status, body) = app.post("/books", payload).await;
        assert_validation_error(status, &body);
    }

    let (_, books) = app.get("/books").await;
    assert_eq!(books.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_author_and_duplicate_genre() {
    let app = TestApp::new();

    let (status, body) = app.post("/authors", json!({"author": ""})).await;
    assert_validation_error(status, &body);

    let (status, _) = app.post("/genres", json!({"genre": "Poem"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post("/genres", json!({"genre": "Poem"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

// --- Partial Update ---

#[tokio::test]
async fn test_patch_rejections_leave_record_unchanged() {
    let app = TestApp::new();
    let id = app.seed_book().await;
    let uri = format!("/books?id={id}");
    let (_, before) = app.get(&uri).await;

    let bad_patches = [
        r#"{"price": -132}"#,
        r#"{"name": "At the pharmacy", "price": -132}"#,
        r#"{"name": null}"#,
        r#"{"price": null}"#,
        r#"{"price": "cheap"}"#,
        r#"{"name": ""}"#,
    ];

    for raw in bad_patches {
        let (status, body) = app.patch(&uri, raw).await;
        assert_validation_error(status, &body);
    }

    let (_, after) = app.get(&uri).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_patch_single_fields_are_independent() {
    let app = TestApp::new();
    let id = app.seed_book().await;
    let uri = format!("/books?id={id}");

    let (status, book) = app.patch(&uri, r#"{"name": "Voyna i mir"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["name"], "Voyna i mir");
    assert_eq!(book["price"], 1000);

    let (status, book) = app.patch(&uri, r#"{"price": 132}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book["name"], "Voyna i mir");
    assert_eq!(book["price"], 132);
}

#[tokio::test]
async fn test_empty_patch_returns_current_record() {
    let app = TestApp::new();
    let id = app.seed_book().await;
    let uri = format!("/books?id={id}");
    let (_, before) = app.get(&uri).await;

    let (status, book) = app.patch(&uri, "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(book, before);
}

#[tokio::test]
async fn test_patch_unknown_id_is_not_found() {
    let app = TestApp::new();
    app.seed_book().await;

    let (status, body) = app.patch("/books?id=9999", r#"{"name": "Anything", "price": 100}"#).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_id_query_is_validated() {
    let app = TestApp::new();
    app.seed_book().await;

    let (status, body) = app.patch("/books", r#"{"price": 1}"#).await;
    assert_validation_error(status, &body);

    let (status, body) = app.patch("/books?id=abc", r#"{"price": 1}"#).await;
    assert_validation_error(status, &body);

    let (status, body) = app.call(Method::DELETE, "/books", None).await;
    assert_validation_error(status, &body);

    let (status, body) = app.get("/books?id=1.5").await;
    assert_validation_error(status, &body);
}

#[tokio::test]
async fn test_query_rejections_use_error_envelope() {
    let app = TestApp::new();
    let id = app.seed_book().await;

    // A repeated key fails query deserialization itself.
    let uri = format!("/books?id={id}&id={id}");
    let (status, body) = app.get(&uri).await;
    assert_validation_error(status, &body);
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());

    let (status, body) = app.patch(&uri, r#"{"price": 1}"#).await;
    assert_validation_error(status, &body);

    let (status, body) = app.call(Method::DELETE, &uri, None).await;
    assert_validation_error(status, &body);

    let (_, book) = app.get(&format!("/books?id={id}")).await;
    assert_eq!(book["price"], 1000);
}

// --- Plumbing ---

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new();

    let (status, doc) = app.get("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/books"].is_object());
    assert!(doc["paths"]["/auth/login"]["post"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer_auth"].is_object());
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

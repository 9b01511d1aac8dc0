use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    sb_api::create_router(sb_api::test_state("test-key"))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Option<Value>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).ok())
}

#[tokio::test]
async fn livez_healthy_and_private_routes_require_auth() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        Request::builder().uri("/livez").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");

    for (method, uri) in [
        (Method::GET, "/api/me"),
        (Method::GET, "/api/workers/me"),
        (Method::POST, "/api/applications/1/accept"),
        (Method::GET, "/api/organizations/1/relationships"),
    ] {
        let (status, _) = send(
            app.clone(),
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn wrong_api_key_is_rejected_with_request_id() {
    let (status, body) = send(
        app(),
        Request::builder()
            .uri("/api/me")
            .header("x-api-key", "nope")
            .header("x-request-id", "req-42")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = body.unwrap();
    assert_eq!(body["code"], "unauthorized");
    assert_eq!(body["request_id"], "req-42");
}

#[tokio::test]
async fn public_lists_validate_pagination_before_touching_the_database() {
    for uri in [
        "/api/postings?limit=0",
        "/api/postings?limit=101",
        "/api/organizations?offset=10001",
    ] {
        let (status, body) = send(
            app(),
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body.unwrap()["code"], "bad_request");
    }
}

#[tokio::test]
async fn posting_filter_with_inverted_dates_is_unprocessable() {
    let (status, _) = send(
        app(),
        Request::builder()
            .uri("/api/postings?from=2030-03-10&to=2030-03-01")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn service_callers_cannot_apply_to_shifts() {
    // API key callers carry no user account to apply with.
    let (status, body) = send(
        app(),
        Request::builder()
            .method(Method::POST)
            .uri("/api/shifts/1/applications")
            .header("x-api-key", "test-key")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.unwrap()["code"], "forbidden");
}

#[tokio::test]
async fn metrics_route_is_not_found_without_a_recorder() {
    let (status, _) = send(
        app(),
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

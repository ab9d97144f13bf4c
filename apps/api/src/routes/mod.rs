pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::auth::handlers as auth;
use crate::errors::AppError;
use crate::history::handlers as history;
use crate::state::AppState;
use crate::usage::handlers as usage;

async fn not_found() -> AppError {
    AppError::NotFound("No such route".to_string())
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Auth
        .route("/api/v1/auth/signin", post(auth::handle_sign_in))
        .route("/api/v1/auth/signup", post(auth::handle_sign_up))
        .route("/api/v1/auth/signout", post(auth::handle_sign_out))
        .route("/api/v1/auth/password/reset", post(auth::handle_password_reset))
        .route("/api/v1/auth/password/update", post(auth::handle_password_update))
        .route("/api/v1/auth/session", get(auth::handle_session))
        // Analysis
        .route(
            "/api/v1/analyses",
            post(analysis::handle_create_analysis).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/analyses/:job_id/progress",
            get(analysis::handle_get_progress),
        )
        // History
        .route("/api/v1/history", get(history::handle_list_history))
        .route("/api/v1/history/:id", get(history::handle_get_history))
        .route(
            "/api/v1/history/:id/report",
            get(history::handle_download_report),
        )
        // Usage
        .route("/api/v1/usage", get(usage::handle_get_usage))
        .fallback(not_found)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_support::{FakeLlm, TestHarness, TEST_TOKEN};

    async fn send(harness: &TestHarness, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = harness.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    async fn send_json(harness: &TestHarness, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = send(harness, request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TEST_TOKEN}"))
    }

    fn multipart(file: &[u8], job_id: Option<&str>) -> (String, Vec<u8>) {
        let boundary = "spider-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"acme.pdf\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(b"\r\n");
        if let Some(job_id) = job_id {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"job_id\"\r\n\r\n{job_id}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    fn upload_request(file: &[u8], job_id: Option<&str>) -> Request<Body> {
        let (content_type, body) = multipart(file, job_id);
        authed("POST", "/api/v1/analyses")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    fn analysis_llm() -> FakeLlm {
        FakeLlm::with_values([
            json!({"isPitchDeck": true, "confidence": 0.9}),
            json!({
                "investmentScore": 8,
                "profile": {"companyName": "Acme", "industry": "FinTech"},
                "competitors": [{"id": "competitor1", "name": "Rival"}],
                "marketComparison": {"metrics": {"marketShare": {"startup": "1%"}}}
            }),
        ])
    }

    #[tokio::test]
    async fn test_health() {
        let harness = TestHarness::new(FakeLlm::empty());
        let (status, body) = send_json(
            &harness,
            Request::get("/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let harness = TestHarness::new(FakeLlm::empty());
        let (status, body) = send_json(
            &harness,
            Request::get("/nope").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_session() {
        let harness = TestHarness::new(FakeLlm::empty());
        for uri in ["/api/v1/history", "/api/v1/usage", "/api/v1/auth/session"] {
            let (status, body) =
                send_json(&harness, Request::get(uri).body(Body::empty()).unwrap()).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        }

        let request = Request::get("/api/v1/history")
            .header(header::AUTHORIZATION, "Bearer revoked")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&harness, request).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_in_and_session() {
        let harness = TestHarness::new(FakeLlm::empty());
        let mut events = harness.auth.subscribe_events();

        let request = Request::post("/api/v1/auth/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"email": "founder@acme.io", "password": "hunter22"}).to_string(),
            ))
            .unwrap();
        let (status, body) = send_json(&harness, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["accessToken"], TEST_TOKEN);
        assert!(events.try_recv().is_ok());

        let (status, body) = send_json(
            &harness,
            authed("GET", "/api/v1/auth/session").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "founder@acme.io");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_401() {
        let harness = TestHarness::new(FakeLlm::empty());
        let request = Request::post("/api/v1/auth/signin")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"email": "founder@acme.io", "password": "wrong-pass"}).to_string(),
            ))
            .unwrap();
        assert_eq!(send(&harness, request).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_password_reset_does_not_reveal_accounts() {
        let harness = TestHarness::new(FakeLlm::empty());
        let request = Request::post("/api/v1/auth/password/reset")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"email": "nobody@acme.io"}).to_string()))
            .unwrap();
        assert_eq!(send(&harness, request).await.0, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_signup_validates_password() {
        let harness = TestHarness::new(FakeLlm::empty());
        let request = Request::post("/api/v1/auth/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"email": "new@acme.io", "password": "123", "fullName": "New"}).to_string(),
            ))
            .unwrap();
        let (status, body) = send_json(&harness, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_upload_analyze_then_browse_history() {
        let harness = TestHarness::new(analysis_llm());

        let (status, body) =
            send_json(&harness, upload_request(b"%PDF-1.7 deck", Some("job-42"))).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["jobId"], "job-42");
        assert_eq!(body["record"]["companyOverview"]["companyName"], "Acme");
        assert_eq!(body["view"]["investmentPercentage"], 80.0);
        assert_eq!(body["view"]["verdictTier"], "excellent");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, progress) = send_json(
            &harness,
            authed("GET", "/api/v1/analyses/job-42/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(progress["state"]["status"], "complete");
        assert_eq!(progress["progress"], 100);
        assert_eq!(progress["finished"], true);

        let (status, list) = send_json(
            &harness,
            authed("GET", "/api/v1/history").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["id"], id);

        let (status, detail) = send_json(
            &harness,
            authed("GET", &format!("/api/v1/history/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["insights"]["industryType"], "FinTech");
        assert!(detail["view"]["verdict"]
            .as_str()
            .unwrap()
            .contains("fintech sector"));

        let (status, report) = send(
            &harness,
            authed("GET", &format!("/api/v1/history/{id}/report"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(report).unwrap().starts_with("# Investment Analysis: Acme"));

        let (_, usage) = send_json(
            &harness,
            authed("GET", "/api/v1/usage").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(usage["usedTokens"], 300);
        assert_eq!(usage["maxTokens"], 20_000);
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let harness = TestHarness::new(analysis_llm());
        let (status, body) = send_json(&harness, upload_request(b"PK\x03\x04zip", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(harness.llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_job_id_is_rejected() {
        let harness = TestHarness::new(analysis_llm());
        let (status, _) = send_json(&harness, upload_request(b"%PDF-1.7", Some("a b c"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_error_surfaces_as_502() {
        let harness = TestHarness::new(FakeLlm::with_texts([
            r#"{"isPitchDeck": true, "confidence": 0.9}"#,
            "Sorry, I can't help with that.",
        ]));
        let (status, body) = send_json(&harness, upload_request(b"%PDF-1.7", Some("job-9"))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "PARSE_ERROR");

        let (_, progress) = send_json(
            &harness,
            authed("GET", "/api/v1/analyses/job-9/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(progress["state"]["status"], "failed");
        assert_eq!(harness.usage.used(harness.user.id), 300);
    }

    #[tokio::test]
    async fn test_history_of_another_user_is_not_found() {
        let harness = TestHarness::new(FakeLlm::empty());
        let other = uuid::Uuid::new_v4();
        let record = crate::analysis::normalize::normalize(&json!({}));
        let id = harness.history.insert(other, record);

        let (status, _) = send_json(
            &harness,
            authed("GET", &format!("/api/v1/history/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_progress_of_unknown_job_is_not_found() {
        let harness = TestHarness::new(FakeLlm::empty());
        let (status, _) = send_json(
            &harness,
            authed("GET", "/api/v1/analyses/missing/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

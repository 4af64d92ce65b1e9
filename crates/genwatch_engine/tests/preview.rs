use genwatch_engine::{
    ApiClient, EngineSettings, FailureKind, PreviewFetcher, ReqwestPreviewFetcher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher_for(server: &MockServer, max_chars: usize) -> ReqwestPreviewFetcher {
    let settings = EngineSettings::with_api_base(server.uri());
    ReqwestPreviewFetcher::new(ApiClient::new(&settings).expect("api client"), max_chars)
}

#[tokio::test]
async fn preview_is_reduced_to_title_and_markdown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/portfolios/p1/preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "portfolio_id": "p1",
            "html": "<html><head><title>Jane Doe</title></head><body><main><h2>Projects</h2><p>genwatch</p></main></body></html>"
        })))
        .mount(&server)
        .await;

    let digest = fetcher_for(&server, 4_096).fetch("p1").await.expect("preview ok");
    assert_eq!(digest.portfolio_id, "p1");
    assert_eq!(digest.title.as_deref(), Some("Jane Doe"));
    assert!(digest.body.contains("Projects"));
    assert!(digest.body.contains("genwatch"));
}

#[tokio::test]
async fn long_preview_is_truncated() {
    let server = MockServer::start().await;
    let paragraph = "word ".repeat(200);
    Mock::given(method("GET"))
        .and(path("/api/portfolios/p1/preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "html": format!("<body><p>{paragraph}</p></body>")
        })))
        .mount(&server)
        .await;

    let digest = fetcher_for(&server, 64).fetch("p1").await.expect("preview ok");
    assert_eq!(digest.portfolio_id, "p1");
    assert!(digest.body.ends_with(".[truncated]"));
    assert!(digest.body.len() <= 64 + "\n.[truncated]".len());
}

#[tokio::test]
async fn preview_errors_carry_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(serde_json::json!({ "detail": "Forbidden portfolio" })),
        )
        .mount(&server)
        .await;

    let err = fetcher_for(&server, 4_096).fetch("p1").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
    assert_eq!(err.message, "Forbidden portfolio");
}

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::settings::endpoint;
use crate::{ApiError, EngineSettings, FailureKind};

/// Thin JSON client for the dashboard REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ApiClient {
    pub fn new(settings: &EngineSettings) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;
        // Fail on a bad base now rather than on the first request.
        endpoint(&settings.api_base, &[])?;
        Ok(Self {
            http,
            base: settings.api_base.clone(),
            access_token: settings.access_token.clone(),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = endpoint(&self.base, segments)?;
        self.send(self.http.get(url)).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = endpoint(&self.base, segments)?;
        let payload = serde_json::to_vec(body)
            .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))?;
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_detail(status, &body),
            ));
        }

        serde_json::from_str(&body)
            .map_err(|err| ApiError::new(FailureKind::InvalidResponse, err.to_string()))
    }
}

/// Human-readable message for a failed request: the payload's `detail`, else
/// the status reason.
fn error_detail(status: StatusCode, body: &str) -> String {
    let fallback = || format!("API error: {}", status.as_u16());
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => match payload.detail {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => detail,
            _ => fallback(),
        },
        Err(_) => status
            .canonical_reason()
            .map(ToOwned::to_owned)
            .unwrap_or_else(fallback),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(FailureKind::InvalidResponse, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}

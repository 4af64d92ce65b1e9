use genwatch_core::PreviewDigest;
use genwatch_logging::gw_debug;
use serde::Deserialize;

use crate::markup::digest_markup;
use crate::{ApiClient, ApiError};

#[derive(Debug, Deserialize)]
struct PreviewResponse {
    #[serde(default)]
    portfolio_id: Option<String>,
    html: String,
}

#[async_trait::async_trait]
pub trait PreviewFetcher: Send + Sync {
    async fn fetch(&self, portfolio_id: &str) -> Result<PreviewDigest, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestPreviewFetcher {
    api: ApiClient,
    max_chars: usize,
}

impl ReqwestPreviewFetcher {
    pub fn new(api: ApiClient, max_chars: usize) -> Self {
        Self { api, max_chars }
    }
}

#[async_trait::async_trait]
impl PreviewFetcher for ReqwestPreviewFetcher {
    async fn fetch(&self, portfolio_id: &str) -> Result<PreviewDigest, ApiError> {
        let response: PreviewResponse = self
            .api
            .get_json(&["api", "portfolios", portfolio_id, "preview"])
            .await?;
        gw_debug!(
            "Preview for portfolio {} returned {} bytes of markup",
            portfolio_id,
            response.html.len()
        );
        let portfolio_id = response
            .portfolio_id
            .unwrap_or_else(|| portfolio_id.to_string());
        Ok(digest_markup(&portfolio_id, &response.html, self.max_chars))
    }
}

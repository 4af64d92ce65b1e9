use genwatch_core::{GenerationJob, MISSING_PORTFOLIO};
use genwatch_logging::{gw_info, gw_warn};

use crate::{ApiClient, ApiError, FailureKind};

/// Starts generation jobs. Every call starts a new job; callers deduplicate.
#[async_trait::async_trait]
pub trait JobTrigger: Send + Sync {
    async fn trigger(&self, portfolio_id: &str) -> Result<GenerationJob, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestJobTrigger {
    api: ApiClient,
}

impl ReqwestJobTrigger {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl JobTrigger for ReqwestJobTrigger {
    async fn trigger(&self, portfolio_id: &str) -> Result<GenerationJob, ApiError> {
        let portfolio_id = portfolio_id.trim();
        if portfolio_id.is_empty() {
            return Err(ApiError::new(
                FailureKind::MissingPortfolio,
                MISSING_PORTFOLIO,
            ));
        }

        gw_info!("Triggering generation for portfolio {}", portfolio_id);
        let result: Result<GenerationJob, ApiError> = self
            .api
            .post_json(
                &["api", "portfolios", portfolio_id, "generate"],
                &serde_json::json!({}),
            )
            .await;

        match &result {
            Ok(job) => gw_info!(
                "Generation job {} started for portfolio {} (status {})",
                job.id,
                portfolio_id,
                job.status
            ),
            Err(err) => gw_warn!(
                "Generation trigger for portfolio {} failed ({}): {}",
                portfolio_id,
                err.kind,
                err.message
            ),
        }
        result
    }
}

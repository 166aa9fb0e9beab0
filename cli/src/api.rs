use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use nutrack_core::models::ActionType;
use nutrack_core::queue::{ReplayRouter, ReplayTarget};

/// Backend endpoint that accepts each kind of queued action.
#[must_use]
pub fn endpoint_for(action_type: ActionType) -> &'static str {
    match action_type {
        ActionType::FoodLog => "food-logs",
        ActionType::WaterLog => "water-logs",
        ActionType::ExerciseLog => "exercise-logs",
        ActionType::WeightLog => "weight-logs",
        ActionType::Post => "posts",
    }
}

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    rt: tokio::runtime::Handle,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "nutrack-cli/{} (nutrition tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            rt: tokio::runtime::Handle::current(),
        })
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    pub async fn post_async(&self, endpoint: &str, payload: &Value) -> Result<()> {
        let url = self.url_for(endpoint);
        let mut req = self.client.post(&url).json(payload);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("{url} responded with {status}");
        }
        Ok(())
    }

    /// One replay target per action type, all backed by this client.
    ///
    /// Replays block on the captured runtime handle, so the router must be
    /// used from a blocking thread rather than from async code.
    pub fn router(self: &Arc<Self>) -> ReplayRouter {
        ActionType::ALL
            .into_iter()
            .fold(ReplayRouter::new(), |router, action_type| {
                router.with_target(
                    action_type,
                    Box::new(ApiEndpoint {
                        client: Arc::clone(self),
                        endpoint: endpoint_for(action_type),
                    }),
                )
            })
    }
}

struct ApiEndpoint {
    client: Arc<ApiClient>,
    endpoint: &'static str,
}

impl ReplayTarget for ApiEndpoint {
    fn send(&self, payload: &Value) -> Result<()> {
        self.client
            .rt
            .block_on(self.client.post_async(self.endpoint, payload))
    }
}

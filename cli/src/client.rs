use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::StatusCode;
use serde::Deserialize;

use physio_core::models::{EntryForm, HealthEntry};
use physio_core::stats::StatsWindow;

/// HTTP client for a running `physio serve` instance.
pub struct DashboardClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CreatedEntry {
    entry: HealthEntry,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "physio-cli/{} (health dashboard)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn list_entries(&self) -> Result<Vec<HealthEntry>> {
        let resp = self
            .client
            .get(self.url("/api/entries"))
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        let resp = error_for_status(resp).await?;
        resp.json().await.context("Failed to parse entries response")
    }

    /// Fetch averages for `window` (all-time when `None`). An empty window
    /// comes back as `None`.
    pub async fn stats(&self, window: Option<&str>) -> Result<Option<StatsWindow>> {
        let mut request = self.client.get(self.url("/api/stats"));
        if let Some(window) = window {
            request = request.query(&[("window", window)]);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = error_for_status(resp).await?;
        let stats = resp.json().await.context("Failed to parse stats response")?;
        Ok(Some(stats))
    }

    pub async fn create_entry(&self, form: &EntryForm) -> Result<HealthEntry> {
        let resp = self
            .client
            .post(self.url("/api/entries"))
            .json(form)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))?;
        let resp = error_for_status(resp).await?;
        let created: CreatedEntry = resp.json().await.context("Failed to parse created entry")?;
        Ok(created.entry)
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<ErrorBody>()
        .await
        .map_or_else(|_| status.to_string(), |body| body.error);
    bail!("Server returned {}: {message}", status.as_u16())
}

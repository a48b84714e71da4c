use std::time::Duration;

use crate::error::{FleetError, Result};

/// Bounded-timeout HTTP GET primitive shared by discovery and polling.
///
/// The timeout budget is split: half is allotted to connection
/// establishment, the full budget to the whole request, so hosts that
/// are slow to even accept a TCP connection are abandoned early and do
/// not starve the concurrency gate.
///
/// Redirects are never followed. A captive portal or an unrelated web
/// server answering with a redirect must not look like a miner.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a probe with the given per-request timeout budget
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout / 2)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(crate::default_user_agent())
            .build()
            .map_err(|e| FleetError::Connection(e.to_string()))?;

        Ok(Self { client })
    }

    /// GET `http://{addr}{path}` and return the response body text.
    ///
    /// Expected network failures come back as typed errors
    /// ([`FleetError::Timeout`], [`FleetError::Connection`],
    /// [`FleetError::Http`]); callers branch on them instead of
    /// catching panics.
    pub async fn fetch_text(&self, addr: &str, path: &str) -> Result<String> {
        let url = format!("http://{}{}", addr, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FleetError::Http(status.as_u16()));
        }

        Ok(response.text().await?)
    }

    /// GET `http://{addr}{path}` and parse the response body as JSON
    pub async fn fetch_json(&self, addr: &str, path: &str) -> Result<serde_json::Value> {
        let body = self.fetch_text(addr, path).await?;
        serde_json::from_str(&body).map_err(Into::into)
    }
}

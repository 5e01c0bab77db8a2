use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub consecutive_failures: u32,
    pub last_heartbeat_at: Option<u64>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub active_target: String,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub switchovers: u64,
    pub generation: u64,
    pub primary: HealthSummary,
    pub spare: HealthSummary,
    #[serde(default)]
    pub total_requests: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowCounts {
    pub total: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchoverMetrics {
    pub t_fail: Option<u64>,
    pub t_first_spare_success: Option<u64>,
    pub time_to_recover_ms: Option<u64>,
    pub error_rate: Option<f64>,
    pub counts: WindowCounts,
    pub active_target: String,
    pub total_requests: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: u64,
    pub backend: String,
    /// HTTP status code, or "timeout" / "error".
    pub status: Value,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsPage {
    pub total: usize,
    pub showing: usize,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectResult {
    pub ok: bool,
    pub t_fail: u64,
    pub mode: String,
    pub primary_response: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct InjectRequest<'a> {
    mode: &'a str,
}

pub struct FailoverClient {
    client: Client,
    base_url: String,
}

impl FailoverClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn status(&self) -> Result<ControllerStatus, Error> {
        let resp = self.client.get(self.url("/status")).send().await?;
        parse(resp).await
    }

    pub async fn metrics(&self) -> Result<SwitchoverMetrics, Error> {
        let resp = self.client.get(self.url("/metrics")).send().await?;
        parse(resp).await
    }

    pub async fn logs(&self, limit: usize) -> Result<LogsPage, Error> {
        let resp = self
            .client
            .get(self.url("/logs"))
            .query(&[("limit", limit)])
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn clear_logs(&self) -> Result<Value, Error> {
        let resp = self.client.delete(self.url("/logs")).send().await?;
        parse(resp).await
    }

    /// Ask the controller to make the primary fail in `mode`.
    pub async fn inject_failure(&self, mode: &str) -> Result<InjectResult, Error> {
        let resp = self
            .client
            .post(self.url("/inject-failure"))
            .json(&InjectRequest { mode })
            .send()
            .await?;
        parse(resp).await
    }

    /// Send traffic back to the primary and clear counters.
    pub async fn reset(&self) -> Result<ControllerStatus, Error> {
        let resp = self.client.post(self.url("/reset")).send().await?;
        parse(resp).await
    }

    pub async fn recover_primary(&self) -> Result<Value, Error> {
        let resp = self.client.post(self.url("/recover-primary")).send().await?;
        parse(resp).await
    }

    /// Push a heartbeat on behalf of `from` ("primary" or "spare").
    pub async fn heartbeat(&self, from: &str) -> Result<Value, Error> {
        let resp = self
            .client
            .post(self.url("/heartbeat"))
            .query(&[("from", from)])
            .send()
            .await?;
        parse(resp).await
    }

    /// Send a request through the controller to the active backend.
    pub async fn forward_get(&self, path: &str) -> Result<Response, reqwest::Error> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn forward_post(&self, path: &str, body: &Value) -> Result<Response, reqwest::Error> {
        self.client.post(self.url(path)).json(body).send().await
    }
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(format!("Controller returned error status {}: {}", status, text).into());
    }

    Ok(serde_json::from_str::<T>(&text)?)
}

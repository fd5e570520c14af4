//! Upstream health probe

use std::time::Duration;

use async_trait::async_trait;

pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// "Is the upstream service reachable?"
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_healthy(&self) -> bool;
}

/// `GET {api_url}/health`, healthy on 200
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpHealthProbe {
    pub fn new(api_url: &str) -> Result<Self, reqwest::Error> {
        Self::with_timeout(api_url, DEFAULT_HEALTH_TIMEOUT)
    }

    pub fn with_timeout(api_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: health_url(api_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn health_url(api_url: &str) -> String {
    format!("{}/health", api_url.trim_end_matches('/'))
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_healthy(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                tracing::debug!(url = %self.url, "API health check passed");
                true
            }
            Ok(resp) => {
                tracing::warn!(url = %self.url, status = %resp.status(), "API health check returned non-200");
                false
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "API health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url() {
        assert_eq!(health_url("http://backend:5000/api"), "http://backend:5000/api/health");
        assert_eq!(health_url("http://backend:5000/api/"), "http://backend:5000/api/health");
    }

    #[tokio::test]
    async fn test_unreachable_is_unhealthy() {
        // port 1 on loopback refuses connections
        let probe = HttpHealthProbe::with_timeout("http://127.0.0.1:1/api", Duration::from_secs(2)).unwrap();
        assert!(!probe.is_healthy().await);
    }
}

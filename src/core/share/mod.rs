use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GdflixConfig;

/// File record returned by the sharing service.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ShareClient {
    cfg: GdflixConfig,
    client: reqwest::Client,
}

impl ShareClient {
    pub fn new(cfg: GdflixConfig, client: reqwest::Client) -> Self {
        Self { cfg, client }
    }

    /// Public download-page link for a share key (or the raw Drive id when
    /// the service returned no key).
    pub fn file_link(&self, info: &ShareInfo, drive_id: &str) -> String {
        let tail = info.key.as_deref().unwrap_or(drive_id);
        format!("{}/{tail}", self.cfg.file_base)
    }

    /// Resolve a Drive file id into a share record. Any failure is logged
    /// and surfaces as None.
    pub async fn share_file(&self, file_id: &str) -> Option<ShareInfo> {
        if self.cfg.api_key.is_empty() || self.cfg.api_base.is_empty() {
            warn!("GdFlix api key or base not set");
            return None;
        }
        let url = format!("{}/share", self.cfg.api_base);
        let resp = match self
            .client
            .get(&url)
            .query(&[("key", self.cfg.api_key.as_str()), ("id", file_id)])
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(r) => r,
            Err(e) => {
                warn!("GdFlix HTTP error: {e}");
                return None;
            }
        };
        let data = match resp.json::<ShareInfo>().await {
            Ok(d) => d,
            Err(e) => {
                warn!("GdFlix body unreadable: {e}");
                return None;
            }
        };
        info!("GdFlix response for {file_id}: name={:?} key={:?}", data.name, data.key);
        if data.error {
            warn!("GdFlix error: {:?}", data.message);
            return None;
        }
        Some(data)
    }
}

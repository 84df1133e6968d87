use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ImageHostConfig;
use crate::utils::Error;

#[derive(Debug, Clone)]
pub struct ImageHostClient {
    cfg: ImageHostConfig,
    client: reqwest::Client,
}

impl ImageHostClient {
    pub fn new(cfg: ImageHostConfig, client: reqwest::Client) -> Self {
        Self { cfg, client }
    }

    /// Upload raw image bytes, returning the hosted public URL.
    pub async fn upload(&self, image_bytes: Vec<u8>) -> Result<String, Error> {
        if self.cfg.api_key.is_empty() {
            return Err(Error::MissingCredential("imagehost.api_key"));
        }

        let source_part = Part::bytes(image_bytes)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::Other(format!("Failed to set image mime: {e}")))?;

        let form = Form::new()
            .text("key", self.cfg.api_key.clone())
            .part("source", source_part);

        let resp = self
            .client
            .post(&self.cfg.upload_api)
            .multipart(form)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(status = %status, "Image host upload response");

        let js: serde_json::Value = serde_json::from_str(&body)
            .map_err(|_| Error::Other(format!("Image host returned non-JSON: HTTP {status}")))?;
        if !js.get("success").map(is_truthy).unwrap_or(false) {
            warn!("Image host upload failed: HTTP {status} body={body}");
            return Err(Error::Other("Upload failed".to_string()));
        }
        js.get("image")
            .and_then(|img| img.get("url"))
            .and_then(|u| u.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Other("Image host response missing image.url".to_string()))
    }
}

// the API reports success either as a bool or as a {code, message} object
fn is_truthy(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Null => false,
        serde_json::Value::Object(_) => true,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Number(n) => n.as_i64() != Some(0),
        serde_json::Value::Array(a) => !a.is_empty(),
    }
}

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Cap on remote bytes fetched before handing the file to mediainfo.
const DOWNLOAD_LIMIT: u64 = 50 * 1024 * 1024;

async fn run_mediainfo(target: &str) -> Option<String> {
    let output = tokio::process::Command::new("mediainfo")
        .arg(target)
        .output()
        .await;
    let out = match output {
        Ok(out) => out,
        Err(e) => {
            warn!("mediainfo failed to start: {e}");
            return None;
        }
    };
    if !out.status.success() {
        warn!("mediainfo exited with {}", out.status);
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).into_owned())
}

async fn download_head(client: &reqwest::Client, url: &str, dest: &Path) -> Option<()> {
    let mut resp = match client
        .get(url)
        .timeout(Duration::from_secs(60))
        .send()
        .await
        .and_then(|r| r.error_for_status())
    {
        Ok(r) => r,
        Err(e) => {
            warn!("mediainfo download failed: {e}");
            return None;
        }
    };

    let mut file = match tokio::fs::File::create(dest).await {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create temp file '{}': {e}", dest.display());
            return None;
        }
    };

    let mut downloaded: u64 = 0;
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                if file.write_all(&chunk).await.is_err() {
                    return None;
                }
                downloaded += chunk.len() as u64;
                if downloaded >= DOWNLOAD_LIMIT {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("mediainfo download interrupted: {e}");
                return None;
            }
        }
    }
    let _ = file.flush().await;
    Some(())
}

/// Diagnostic text for a local path or a remote URL. Remote targets are
/// fetched into a temp file, capped at 50 MiB. Any failure yields None.
pub async fn get_mediainfo_text(client: &reqwest::Client, target: &str) -> Option<String> {
    if target.starts_with("http://") || target.starts_with("https://") {
        info!("Downloading partial data for mediainfo from: {target}");
        let tmp = match tempfile::Builder::new().suffix(".bin").tempfile() {
            Ok(t) => t,
            Err(e) => {
                warn!("Failed to create temp file: {e}");
                return None;
            }
        };
        download_head(client, target, tmp.path()).await?;
        run_mediainfo(tmp.path().to_string_lossy().as_ref()).await
    } else {
        run_mediainfo(target).await
    }
}

/// Remote size from a HEAD request's content-length, if the server offers one.
pub async fn get_remote_size(client: &reqwest::Client, url: &str) -> Option<u64> {
    let resp = match client
        .head(url)
        .timeout(Duration::from_secs(20))
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!("HEAD size failed: {e}");
            return None;
        }
    };
    resp.headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

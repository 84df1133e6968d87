use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*)\.([A-Za-z0-9]{1,4})$").unwrap());
static DRIVE_FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/file/d/([^/]+)").unwrap());
static HOURS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static MINUTES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*(mn|min)").unwrap());
static SECONDS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*s").unwrap());

/// Drop a trailing `?query` and a short alphanumeric extension from a file name.
pub fn strip_extension(name: &str) -> String {
    let base = name.split('?').next().unwrap_or(name);
    if let Some(caps) = EXTENSION_RE.captures(base) {
        if let Some(m) = caps.get(1) {
            return m.as_str().to_string();
        }
    }
    base.to_string()
}

pub fn human_readable_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "Unknown".to_string();
    }
    let gb = size_bytes as f64 / (1024u64.pow(3) as f64);
    if gb >= 1.0 {
        return format!("{gb:.1}GB");
    }
    let mb = size_bytes as f64 / (1024u64.pow(2) as f64);
    format!("{mb:.1}MB")
}

/// Bucket a pixel height into the usual `{res}p` labels.
pub fn change_quality(num: i64) -> String {
    if num > 2160 {
        format!("{num}p")
    } else if num > 1080 {
        "2160p".to_string()
    } else if num > 720 {
        "1080p".to_string()
    } else if num > 540 {
        "720p".to_string()
    } else if num > 480 {
        "540p".to_string()
    } else if num > 360 {
        "480p".to_string()
    } else {
        format!("{num}p")
    }
}

/// Parse mediainfo-style durations ("2 h 5 mn", "45mn 12s") to total seconds.
pub fn parse_duration_to_seconds(dur: &str) -> Option<u64> {
    if dur.is_empty() {
        return None;
    }
    let grab = |re: &Regex| {
        re.captures(dur)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let total = grab(&HOURS_RE) * 3600 + grab(&MINUTES_RE) * 60 + grab(&SECONDS_RE);
    if total > 0 {
        Some(total)
    } else {
        None
    }
}

pub fn is_gdrive_link(url: &str) -> bool {
    url.contains("drive.google.com")
}

pub fn is_workers_link(url: &str) -> bool {
    url.contains("gd.rickgrimesflix.workers.dev")
}

fn query_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Drive file id from a `/file/d/<id>` path or an `?id=` query parameter.
pub fn extract_drive_id(url: &str) -> Option<String> {
    if let Some(caps) = DRIVE_FILE_RE.captures(url) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    query_id(url)
}

pub fn extract_drive_id_from_workers(url: &str) -> Option<String> {
    query_id(url)
}

/// A workers link that addresses a file by path rather than by Drive id.
pub fn extract_workers_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if parsed.path().contains("/0:") {
        Some(url.to_string())
    } else {
        None
    }
}

pub fn workers_link_from_drive_id(file_id: &str, workers_base: &str) -> String {
    format!("{workers_base}/0:findpath?id={file_id}")
}

/// Last path segment of a URL, percent-decoded. "Unknown" when empty.
pub fn file_name_from_url(url: &str) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(|s| s.to_string()))
        })
        .map(|s| {
            percent_encoding::percent_decode_str(&s)
                .decode_utf8_lossy()
                .into_owned()
        })
        .unwrap_or_default();
    if name.is_empty() {
        "Unknown".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_short_extensions_only() {
        assert_eq!(strip_extension("Movie.Name.2023.mkv"), "Movie.Name.2023");
        assert_eq!(strip_extension("archive.tar?token=abc"), "archive");
        // five-char tail is not treated as an extension
        assert_eq!(strip_extension("Show.S01E02.webdl"), "Show.S01E02.webdl");
    }

    #[test]
    fn size_formatting() {
        assert_eq!(human_readable_size(0), "Unknown");
        assert_eq!(human_readable_size(3 * 1024 * 1024 * 1024 / 2), "1.5GB");
        assert_eq!(human_readable_size(700 * 1024 * 1024), "700.0MB");
    }

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration_to_seconds("2 h 5 mn"), Some(7500));
        assert_eq!(parse_duration_to_seconds("45mn 12s"), Some(2712));
        assert_eq!(parse_duration_to_seconds(""), None);
        assert_eq!(parse_duration_to_seconds("n/a"), None);
    }

    #[test]
    fn drive_id_extraction() {
        assert_eq!(
            extract_drive_id("https://drive.google.com/file/d/abc123XY/view").as_deref(),
            Some("abc123XY")
        );
        assert_eq!(
            extract_drive_id("https://drive.google.com/open?id=zz99").as_deref(),
            Some("zz99")
        );
        assert_eq!(extract_drive_id("https://drive.google.com/drive/folders"), None);
    }

    #[test]
    fn workers_links() {
        let base = "https://gd.rickgrimesflix.workers.dev";
        assert_eq!(
            workers_link_from_drive_id("abc", base),
            "https://gd.rickgrimesflix.workers.dev/0:findpath?id=abc"
        );
        assert!(extract_workers_path("https://gd.rickgrimesflix.workers.dev/0:/films/a.mkv").is_some());
        assert!(extract_workers_path("https://gd.rickgrimesflix.workers.dev/about").is_none());
    }

    #[test]
    fn url_file_names() {
        assert_eq!(
            file_name_from_url("https://host/path/My%20Movie.mkv"),
            "My Movie.mkv"
        );
        assert_eq!(file_name_from_url("https://host/"), "Unknown");
    }

    #[test]
    fn quality_buckets() {
        assert_eq!(change_quality(2160), "2160p");
        assert_eq!(change_quality(1080), "1080p");
        assert_eq!(change_quality(544), "720p");
        assert_eq!(change_quality(360), "360p");
    }
}

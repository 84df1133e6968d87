use serde_json::Value;
use std::time::Duration;

/// One streaming service the bot can pull poster URLs from, through the
/// corresponding worker API.
#[derive(Debug, Clone, Copy)]
pub struct PosterProvider {
    pub command: &'static str,
    pub usage: &'static str,
    pub label: &'static str,
    pub portrait_label: &'static str,
    pub api_base: &'static str,
    /// Restricted providers honour the allowed-user list even in private chats.
    pub restricted: bool,
}

pub static PROVIDERS: &[PosterProvider] = &[
    PosterProvider { command: "amzn", usage: "/amzn <primevideo url>", label: "AMZN Poster:", portrait_label: "Portrait:", api_base: "https://amzn.rickheroko.workers.dev/", restricted: false },
    PosterProvider { command: "airtel", usage: "/airtel <airtel url>", label: "AIRTEL Poster:", portrait_label: "Portrait:", api_base: "https://hgbots.vercel.app/bypaas/airtel.php", restricted: false },
    PosterProvider { command: "zee5", usage: "/zee5 <zee5 url>", label: "ZEE5 Poster:", portrait_label: "Portrait:", api_base: "https://hgbots.vercel.app/bypaas/zee.php", restricted: false },
    PosterProvider { command: "hulu", usage: "/hulu <hulu url>", label: "Hulu Poster:", portrait_label: "", api_base: "https://hulu.rickheroko.workers.dev/", restricted: true },
    PosterProvider { command: "viki", usage: "/viki <viki.com url>", label: "VIKI Poster:", portrait_label: "Portrait:", api_base: "https://netflix.primejcw.workers.dev/", restricted: false },
    PosterProvider { command: "snxt", usage: "/snxt <sunnxt url>", label: "SNXT Poster:", portrait_label: "Portrait:", api_base: "https://snxt.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "mmax", usage: "/mmax <manoramamax url>", label: "ManoramaMax Poster:", portrait_label: "Portrait:", api_base: "https://mmax.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "aha", usage: "/aha <aha url>", label: "Aha Poster:", portrait_label: "Portrait:", api_base: "https://aha.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "dsnp", usage: "/dsnp <disney+ url>", label: "Dsnp Poster:", portrait_label: "Portrait:", api_base: "https://dsnp.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "apple", usage: "/apple <AppleTv url>", label: "AppleTV Poster:", portrait_label: "Portrait:", api_base: "https://appletv.rickheroko.workers.dev/", restricted: false },
    PosterProvider { command: "bms", usage: "/bms <BookMyShow url>", label: "BookMyShow Poster:", portrait_label: "Portrait:", api_base: "https://bookmyshow-dcbots.jibinlal232.workers.dev/", restricted: false },
    PosterProvider { command: "iq", usage: "/iq <IQIYI url>", label: "iQIYI Poster:", portrait_label: "Portrait:", api_base: "https://iq.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "hbo", usage: "/hbo <HBOMAX url>", label: "HBOMAX Poster:", portrait_label: "Portrait:", api_base: "https://hbomax.rickgrimesapi.workers.dev/", restricted: false },
    PosterProvider { command: "up", usage: "/up <UltraPlay url>", label: "UltraPlay Poster:", portrait_label: "Portrait:", api_base: "https://ultraplay.rickheroko.workers.dev/", restricted: false },
    PosterProvider { command: "uj", usage: "/uj <UltraJhakaas url>", label: "UltraJhakaas Poster:", portrait_label: "Portrait:", api_base: "https://ultrajhakaas.rickheroko.workers.dev/", restricted: false },
    PosterProvider { command: "wetv", usage: "/wetv <wetv url>", label: "WeTv Poster:", portrait_label: "Portrait:", api_base: "https://wetv.the-zake.workers.dev/", restricted: false },
];

pub fn provider_for_command(command: &str) -> Option<&'static PosterProvider> {
    PROVIDERS.iter().find(|p| p.command == command)
}

// Domain substrings handled by the /rk repost flow.
static REPOST_APIS: &[(&str, &str)] = &[
    ("netflix.com", "https://nf.rickgrimesapi.workers.dev/"),
    ("primevideo.com", "https://amzn.rickheroko.workers.dev/"),
    ("sunnxt.com", "https://snxt.rickgrimesapi.workers.dev/"),
    ("zee5.com", "https://hgbots.vercel.app/bypaas/zee.php"),
    ("aha.video", "https://aha.rickgrimesapi.workers.dev/"),
    ("manoramamax.com", "https://mmax.rickgrimesapi.workers.dev/"),
    ("viki.com", "https://netflix.primejcw.workers.dev/"),
    ("iq.com", "https://iq.rickgrimesapi.workers.dev/"),
    ("hbomax.com", "https://hbomax.rickgrimesapi.workers.dev/"),
    ("apple.com", "https://appletv.rickheroko.workers.dev/"),
    ("disneyplus.com", "https://dsnp.rickgrimesapi.workers.dev/"),
    ("ultraplay", "https://ultraplay.rickgrimesapi.workers.dev/"),
];

pub fn repost_api_for(stream_url: &str) -> Option<&'static str> {
    REPOST_APIS
        .iter()
        .find(|(domain, _)| stream_url.contains(domain))
        .map(|(_, api)| *api)
}

/// Worker API call: `{api}?url=<stream url>`. Error string mirrors what the
/// bot shows the user.
pub async fn fetch_stream_data(
    client: &reqwest::Client,
    api_base: &str,
    stream_url: &str,
) -> Result<Value, String> {
    let resp = client
        .get(api_base)
        .query(&[("url", stream_url)])
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("HTTP {}", resp.status()));
    }
    resp.json::<Value>().await.map_err(|_| "Invalid JSON".to_string())
}

fn str_key<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| data.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
}

fn year_key(data: &Value) -> Option<String> {
    for k in ["year", "release_year", "releaseYear", "date"] {
        match data.get(k) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

pub fn landscape_url(data: &Value) -> Option<String> {
    str_key(data, &["landscape", "backdrop", "horizontal", "cover"]).map(str::to_string)
}

pub fn portrait_url(data: &Value) -> Option<String> {
    str_key(data, &["poster", "portrait", "vertical", "image"]).map(str::to_string)
}

/// HTML reply for a poster command, keys tolerated loosely since every
/// worker names them differently.
pub fn format_stream_reply(data: &Value, label: &str, portrait_label: &str) -> String {
    let title = str_key(data, &["title"]).unwrap_or("Unknown");
    let full_title = match year_key(data) {
        Some(year) => format!("{title} - ({year})"),
        None => title.to_string(),
    };
    let landscape = landscape_url(data).unwrap_or_else(|| "Not Found".to_string());
    let portrait = portrait_url(data).unwrap_or_else(|| "Not Found".to_string());
    format!(
        "<b>{label} {landscape}</b>\n\n\
<b>{portrait_label} {portrait}</b>\n\n\
<b>{full_title}</b>\n\n\
<b><blockquote>Powered By: <a href='https://t.me/ott_posters_club'>Ott Posters Club 🎞️</a></blockquote></b>"
    )
}

/// /nf lays its reply out differently: the portrait hides behind a
/// "Click" link and a missing year shows as the current release year.
pub fn format_netflix_reply(data: &Value) -> String {
    let landscape = str_key(data, &["landscape", "backdrop"]).unwrap_or("Not Found");
    let portrait = str_key(data, &["portrait", "poster"]).unwrap_or("Not Found");
    let title = str_key(data, &["title", "name"]).unwrap_or("Unknown");
    let year = year_key(data).unwrap_or_else(|| "2025".to_string());
    format!(
        "<b>Netflix Poster:</b> <b>{landscape}</b>\n\n\
<b>Portrait:</b> <b><a href='{portrait}'>Click</a></b>\n\n\
<b>{title} ({year})</b>\n\n\
<b><blockquote>Powered By: <a href='https://t.me/ott_posters_club'>Ott Posters Club 🎞️</a></blockquote></b>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn provider_lookup() {
        assert_eq!(provider_for_command("amzn").unwrap().label, "AMZN Poster:");
        assert!(provider_for_command("nope").is_none());
        assert!(provider_for_command("hulu").unwrap().restricted);
    }

    #[test]
    fn repost_api_lookup() {
        assert!(repost_api_for("https://www.primevideo.com/detail/x").is_some());
        assert!(repost_api_for("https://example.com/movie").is_none());
    }

    #[test]
    fn reply_formatting_tolerates_loose_keys() {
        let data = json!({
            "title": "Some Film",
            "releaseYear": 2022,
            "backdrop": "https://img/land.jpg",
            "vertical": "https://img/port.jpg",
        });
        let text = format_stream_reply(&data, "AMZN Poster:", "Portrait:");
        assert!(text.contains("AMZN Poster: https://img/land.jpg"));
        assert!(text.contains("Portrait: https://img/port.jpg"));
        assert!(text.contains("Some Film - (2022)"));
    }

    #[test]
    fn netflix_reply_layout() {
        let data = json!({
            "title": "Some Show",
            "landscape": "https://img/land.jpg",
            "portrait": "https://img/port.jpg",
        });
        let text = format_netflix_reply(&data);
        assert!(text.contains("<b>Netflix Poster:</b> <b>https://img/land.jpg</b>"));
        // portrait hides behind a link, not a bare URL
        assert!(text.contains("<a href='https://img/port.jpg'>Click</a>"));
        // no dash between title and year, year defaults when absent
        assert!(text.contains("<b>Some Show (2025)</b>"));

        let empty = format_netflix_reply(&json!({}));
        assert!(empty.contains("<b>Netflix Poster:</b> <b>Not Found</b>"));
        assert!(empty.contains("<b>Unknown (2025)</b>"));
    }

    #[test]
    fn reply_formatting_missing_everything() {
        let text = format_stream_reply(&json!({}), "X:", "Y:");
        assert!(text.contains("X: Not Found"));
        assert!(text.contains("<b>Unknown</b>"));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

/// Sentinel used everywhere a release year is unknown.
pub const UNKNOWN_YEAR: &str = "????";

const API_BASE: &str = "https://api.themoviedb.org/3";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

static SEASON_EPISODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bS\d{1,2}E\d{1,2}\b").unwrap());
static SEASON_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bS\d{1,2}\b").unwrap());
static CATALOG_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"themoviedb\.org/(movie|tv)/(\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    fn as_path(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub title: String,
    /// "????" when the catalog has no date either.
    pub year: String,
    pub language_code: Option<String>,
    pub poster_url: Option<String>,
    pub catalog_url: Option<String>,
    pub kind: MediaKind,
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchItem>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct SearchItem {
    id: Option<i64>,
    title: Option<String>,
    name: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    original_language: Option<String>,
    poster_path: Option<String>,
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    backdrops: Vec<Backdrop>,
}

#[derive(Debug, Deserialize, Clone)]
struct Backdrop {
    iso_639_1: Option<String>,
    file_path: Option<String>,
}

/// Strip an `SxxEyy` (or bare `Sxx`) marker and everything after it.
/// Falls back to the trimmed original when truncation leaves nothing.
pub fn effective_search_title(raw_title: &str) -> String {
    let truncated = if let Some(m) = SEASON_EPISODE_RE.find(raw_title) {
        raw_title[..m.start()].trim()
    } else if let Some(m) = SEASON_ONLY_RE.find(raw_title) {
        raw_title[..m.start()].trim()
    } else {
        raw_title.trim()
    };
    if truncated.is_empty() {
        raw_title.trim().to_string()
    } else {
        truncated.to_string()
    }
}

// char-boundary safe: a malformed date passes through whole instead of panicking
fn first_four(date: &str) -> &str {
    date.get(..4).unwrap_or(date)
}

fn exact_year<'a>(
    items: &'a [SearchItem],
    year: &str,
    date_of: fn(&SearchItem) -> Option<&str>,
) -> Vec<&'a SearchItem> {
    items
        .iter()
        .filter(|it| date_of(it).map(first_four) == Some(year))
        .collect()
}

fn movie_date(it: &SearchItem) -> Option<&str> {
    it.release_date.as_deref()
}

fn tv_date(it: &SearchItem) -> Option<&str> {
    it.first_air_date.as_deref()
}

/// Maps a catalog 2-letter language code to a display name; an observed
/// audio language always wins over the catalog's guess.
pub fn pick_language(catalog_code: Option<&str>, audio_lang: Option<&str>) -> String {
    if let Some(l) = audio_lang {
        if !l.is_empty() {
            return l.to_string();
        }
    }
    let code = catalog_code.unwrap_or("").to_lowercase();
    let name = match code.as_str() {
        "en" => "English",
        "ta" => "Tamil",
        "te" => "Telugu",
        "ml" => "Malayalam",
        "hi" => "Hindi",
        "kn" => "Kannada",
        "mr" => "Marathi",
        "bn" => "Bengali",
        "pa" => "Punjabi",
        "zh" => "Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "" => "Unknown",
        other => return other.to_uppercase(),
    };
    name.to_string()
}

fn choose_backdrop(backdrops: &[Backdrop]) -> Option<&Backdrop> {
    backdrops
        .iter()
        .find(|b| b.iso_639_1.as_deref() == Some("en"))
        .or_else(|| {
            backdrops
                .iter()
                .find(|b| matches!(b.iso_639_1.as_deref(), None | Some("") | Some("xx")))
        })
        .or_else(|| backdrops.first())
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
    api_key: String,
    api_base: String,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(api_key: String, client: reqwest::Client) -> Self {
        Self {
            api_key,
            api_base: API_BASE.to_string(),
            client,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn search(&self, endpoint: &str, params: &[(&str, &str)]) -> Vec<SearchItem> {
        let url = format!("{}/search/{endpoint}", self.api_base);
        let mut query: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("include_adult", "false"),
            ("page", "1"),
        ];
        query.extend_from_slice(params);

        let resp = match self
            .client
            .get(&url)
            .query(&query)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("TMDB {endpoint} search failed: {e}");
                return Vec::new();
            }
        };
        if !resp.status().is_success() {
            warn!("TMDB {endpoint} HTTP {}", resp.status());
            return Vec::new();
        }
        match resp.json::<SearchResponse>().await {
            Ok(body) => body.results,
            Err(e) => {
                warn!("TMDB {endpoint} body unreadable: {e}");
                Vec::new()
            }
        }
    }

    /// Ordered lookup: movie namespace (exact year when known), then tv,
    /// then, only when no year was supplied, the multi-search fallback.
    pub async fn strict_match(&self, raw_title: &str, year: &str) -> Option<CatalogMatch> {
        if self.api_key.is_empty() {
            warn!("TMDB api key not set");
            return None;
        }
        let search_title = effective_search_title(raw_title);
        let have_year = year != UNKNOWN_YEAR;

        let mut item: Option<SearchItem> = None;
        let mut kind = MediaKind::Movie;

        let movie_params: Vec<(&str, &str)> = if have_year {
            vec![("query", search_title.as_str()), ("year", year)]
        } else {
            vec![("query", search_title.as_str())]
        };
        let movie_results = self.search("movie", &movie_params).await;
        let movie_pick = if have_year {
            exact_year(&movie_results, year, movie_date)
                .first()
                .map(|it| (*it).clone())
        } else {
            movie_results.first().cloned()
        };
        if let Some(it) = movie_pick {
            item = Some(it);
        }

        if item.is_none() {
            let tv_params: Vec<(&str, &str)> = if have_year {
                vec![("query", search_title.as_str()), ("first_air_date_year", year)]
            } else {
                vec![("query", search_title.as_str())]
            };
            let tv_results = self.search("tv", &tv_params).await;
            let tv_pick = if have_year {
                exact_year(&tv_results, year, tv_date)
                    .first()
                    .map(|it| (*it).clone())
            } else {
                tv_results.first().cloned()
            };
            if let Some(it) = tv_pick {
                item = Some(it);
                kind = MediaKind::Series;
            }
        }

        if item.is_none() && !have_year {
            let multi = self
                .search("multi", &[("query", search_title.as_str())])
                .await;
            if let Some(it) = multi.first().cloned() {
                kind = match it.media_type.as_deref() {
                    Some("tv") => MediaKind::Series,
                    // unknown types default to movie
                    _ => MediaKind::Movie,
                };
                item = Some(it);
            }
        }

        let Some(item) = item else {
            warn!("TMDB: no match for '{search_title}' ({year})");
            return None;
        };

        if item.media_type.as_deref() == Some("tv") {
            kind = MediaKind::Series;
        }

        Some(assemble_match(item, kind, &search_title, year))
    }

    /// Direct by-id lookup, used when the user pastes a catalog URL.
    pub async fn lookup_by_url(&self, catalog_url: &str) -> Option<CatalogMatch> {
        let caps = CATALOG_URL_RE.captures(catalog_url)?;
        let kind = if &caps[1] == "tv" {
            MediaKind::Series
        } else {
            MediaKind::Movie
        };
        let id = caps[2].to_string();

        let url = format!("{}/{}/{id}", self.api_base, kind.as_path());
        let resp = match self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("TMDB by-id lookup failed: {e}");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!("TMDB by-id HTTP {}", resp.status());
            return None;
        }
        let item = match resp.json::<SearchItem>().await {
            Ok(it) => it,
            Err(e) => {
                warn!("TMDB by-id body unreadable: {e}");
                return None;
            }
        };
        Some(assemble_match(item, kind, "Unknown", UNKNOWN_YEAR))
    }

    /// English-preferred backdrop for a previously resolved catalog URL.
    pub async fn backdrop_from_catalog_url(&self, catalog_url: &str) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }
        let caps = CATALOG_URL_RE.captures(catalog_url)?;
        let url = format!("{}/{}/{}/images", self.api_base, &caps[1], &caps[2]);
        let resp = match self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("include_image_language", "en,null"),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("TMDB images lookup failed: {e}");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!("TMDB images HTTP {}", resp.status());
            return None;
        }
        let body = match resp.json::<ImagesResponse>().await {
            Ok(b) => b,
            Err(e) => {
                warn!("TMDB images body unreadable: {e}");
                return None;
            }
        };
        if body.backdrops.is_empty() {
            warn!("No TMDB backdrops found");
            return None;
        }
        let chosen = choose_backdrop(&body.backdrops)?;
        let file_path = chosen.file_path.as_deref()?;
        let url = format!("{IMAGE_BASE}{file_path}");
        info!("TMDB backdrop URL: {url}");
        Some(url)
    }

    pub async fn download_poster_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let resp = match self
            .client
            .get(url)
            .timeout(Duration::from_secs(20))
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Poster download failed: {e}");
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!("Poster download HTTP {}", resp.status());
            return None;
        }
        match resp.bytes().await {
            Ok(b) if !b.is_empty() => Some(b.to_vec()),
            _ => None,
        }
    }
}

fn assemble_match(item: SearchItem, kind: MediaKind, query_title: &str, query_year: &str) -> CatalogMatch {
    let title = item
        .title
        .clone()
        .or_else(|| item.name.clone())
        .unwrap_or_else(|| query_title.to_string());
    let year = item
        .release_date
        .as_deref()
        .filter(|d| !d.is_empty())
        .or_else(|| item.first_air_date.as_deref().filter(|d| !d.is_empty()))
        .map(|d| first_four(d).to_string())
        .unwrap_or_else(|| query_year.to_string());
    let poster_url = item
        .poster_path
        .as_deref()
        .map(|p| format!("{IMAGE_BASE}{p}"));
    let catalog_url = item
        .id
        .map(|id| format!("https://www.themoviedb.org/{}/{id}", kind.as_path()));
    CatalogMatch {
        title,
        year,
        language_code: item.original_language.clone().filter(|l| !l.is_empty()),
        poster_url,
        catalog_url,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn results(body: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "results": body }))
    }

    fn test_client(server: &MockServer) -> CatalogClient {
        CatalogClient::new("test-key".to_string(), reqwest::Client::new())
            .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn wrong_year_movie_candidates_fall_through_to_tv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(results(json!([
                { "id": 1, "title": "Show", "release_date": "2019-01-01" }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .respond_with(results(json!([
                { "id": 7, "name": "Show", "first_air_date": "2021-03-03" }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .respond_with(results(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let m = test_client(&server)
            .strict_match("Show", "2021")
            .await
            .expect("tv namespace should have matched");
        assert_eq!(m.year, "2021");
        assert_eq!(m.kind, MediaKind::Series);
        assert_eq!(m.catalog_url.as_deref(), Some("https://www.themoviedb.org/tv/7"));
    }

    #[tokio::test]
    async fn multi_fallback_runs_once_and_only_without_a_year() {
        let server = MockServer::start().await;
        // one hit per strict_match call below
        Mock::given(method("GET"))
            .and(path("/search/movie"))
            .respond_with(results(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/tv"))
            .respond_with(results(json!([])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search/multi"))
            .respond_with(results(json!([
                { "id": 9, "name": "Ghost Show", "first_air_date": "2018-01-01", "media_type": "tv" }
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let client = test_client(&server);

        // a supplied year shuts the multi fallback off
        assert!(client.strict_match("Ghost", "1999").await.is_none());

        let m = client
            .strict_match("Ghost", UNKNOWN_YEAR)
            .await
            .expect("multi fallback should have matched");
        assert_eq!(m.title, "Ghost Show");
        assert_eq!(m.kind, MediaKind::Series);
        assert_eq!(m.year, "2018");
    }

    #[test]
    fn season_markers_truncate_the_title() {
        assert_eq!(effective_search_title("Show.Name S02E05 1080p"), "Show.Name");
        assert_eq!(effective_search_title("Show Name s3 pack"), "Show Name");
        assert_eq!(effective_search_title("Plain Movie 2021"), "Plain Movie 2021");
        // no word boundary inside a token
        assert_eq!(effective_search_title("CLASSIC"), "CLASSIC");
    }

    #[test]
    fn empty_truncation_falls_back_to_original() {
        assert_eq!(effective_search_title("S01E01 pilot"), "S01E01 pilot");
    }

    #[test]
    fn exact_year_filter_drops_wrong_years() {
        let items = vec![
            SearchItem {
                release_date: Some("2019-05-01".to_string()),
                ..Default::default()
            },
            SearchItem {
                release_date: Some("2021-02-11".to_string()),
                ..Default::default()
            },
        ];
        let picked = exact_year(&items, "2021", movie_date);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].release_date.as_deref(), Some("2021-02-11"));
        assert!(exact_year(&items, "1999", movie_date).is_empty());
    }

    #[test]
    fn year_prefix_tolerates_short_and_multibyte_dates() {
        assert_eq!(first_four("2021-02-11"), "2021");
        assert_eq!(first_four("99"), "99");
        assert_eq!(first_four(""), "");
        // multibyte character straddling the fourth byte must not panic
        assert_eq!(first_four("20２1-01-01"), "20２1-01-01");
    }

    #[test]
    fn language_table() {
        assert_eq!(pick_language(Some("hi"), None), "Hindi");
        assert_eq!(pick_language(Some("en"), None), "English");
        assert_eq!(pick_language(Some("fr"), None), "FR");
        assert_eq!(pick_language(None, None), "Unknown");
        // observed audio language always wins
        assert_eq!(pick_language(Some("en"), Some("Tamil")), "Tamil");
        assert_eq!(pick_language(Some("en"), Some("")), "English");
    }

    #[test]
    fn backdrop_preference_en_then_untagged_then_first() {
        let bd = |lang: Option<&str>, path: &str| Backdrop {
            iso_639_1: lang.map(str::to_string),
            file_path: Some(path.to_string()),
        };
        let all = vec![bd(Some("de"), "/de.jpg"), bd(None, "/null.jpg"), bd(Some("en"), "/en.jpg")];
        assert_eq!(choose_backdrop(&all).unwrap().file_path.as_deref(), Some("/en.jpg"));

        let no_en = vec![bd(Some("de"), "/de.jpg"), bd(Some("xx"), "/xx.jpg")];
        assert_eq!(choose_backdrop(&no_en).unwrap().file_path.as_deref(), Some("/xx.jpg"));

        let tagged_only = vec![bd(Some("de"), "/de.jpg"), bd(Some("fr"), "/fr.jpg")];
        assert_eq!(choose_backdrop(&tagged_only).unwrap().file_path.as_deref(), Some("/de.jpg"));
    }

    #[test]
    fn match_assembly_prefers_entry_fields() {
        let item = SearchItem {
            id: Some(42),
            name: Some("Canonical Show".to_string()),
            first_air_date: Some("2018-09-10".to_string()),
            original_language: Some("ko".to_string()),
            poster_path: Some("/p.jpg".to_string()),
            ..Default::default()
        };
        let m = assemble_match(item, MediaKind::Series, "raw query", UNKNOWN_YEAR);
        assert_eq!(m.title, "Canonical Show");
        assert_eq!(m.year, "2018");
        assert_eq!(m.language_code.as_deref(), Some("ko"));
        assert_eq!(m.poster_url.as_deref(), Some("https://image.tmdb.org/t/p/original/p.jpg"));
        assert_eq!(m.catalog_url.as_deref(), Some("https://www.themoviedb.org/tv/42"));
    }

    #[test]
    fn match_assembly_falls_back_to_query() {
        let m = assemble_match(SearchItem::default(), MediaKind::Movie, "Raw Title", "????");
        assert_eq!(m.title, "Raw Title");
        assert_eq!(m.year, "????");
        assert!(m.poster_url.is_none());
        assert!(m.catalog_url.is_none());
    }
}

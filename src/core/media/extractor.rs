use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::naming::parse_duration_to_seconds;

// Number followed by a unit token; the *last* occurrence in a string wins.
static BITRATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9][0-9 .]*)(\s*(?:kb/s|kbps|Mb/s|mb/s|bits/s))").unwrap());

fn map_video_codec(format: &str) -> Option<&'static str> {
    match format {
        "AVC" => Some("H.264"),
        "HEVC" => Some("H.265"),
        "VP9" => Some("VP9"),
        "AV1" => Some("AV1"),
        _ => None,
    }
}

fn map_audio_codec(format: &str) -> &str {
    match format {
        "E-AC-3 JOC" => "DDPA",
        "E-AC-3" => "DDP",
        "AC-3" => "DD",
        "AAC LC" => "AAC",
        other => other,
    }
}

fn map_channels(raw: &str) -> String {
    match raw {
        "2" => "2.0".to_string(),
        "6" => "5.1".to_string(),
        "8" => "7.1".to_string(),
        other => other.to_string(),
    }
}

/// Last `number + unit` pair in `s`, with spaces stripped from the number
/// and "kbps" rewritten to "kb/s".
pub fn extract_bitrate_from_string(s: &str) -> Option<String> {
    let caps = BITRATE_RE.captures_iter(s).last()?;
    let num = caps[1].replace(' ', "");
    let unit = caps[2].to_lowercase().replace("kbps", "kb/s");
    Some(format!("{num}{unit}"))
}

/// One paragraph of diagnostic text, as ordered key/value pairs plus the raw
/// block (the raw text is still scanned when no labeled field has a bitrate).
#[derive(Debug, Clone)]
struct TrackRecord {
    fields: Vec<(String, String)>,
    raw: String,
}

impl TrackRecord {
    fn parse(block: &str) -> Option<Self> {
        let mut fields = Vec::new();
        for line in block.lines() {
            if let Some((key, value)) = line.split_once(':') {
                fields.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        if fields.is_empty() {
            return None;
        }
        Some(Self {
            fields,
            raw: block.to_string(),
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub index: usize,
    pub channels: String,
    pub bitrate: String,
    pub language: String,
    pub codec: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSummary {
    /// HTML audio-track block, empty when no audio track was found.
    pub summary: String,
    /// Language of the first audio track; authoritative over catalog metadata.
    pub primary_audio_language: Option<String>,
    pub duration_seconds: Option<u64>,
    pub video_codec: Option<String>,
    pub audio_tracks: Vec<AudioTrack>,
}

fn audio_bitrate(rec: &TrackRecord) -> String {
    for (k, v) in &rec.fields {
        let lk = k.to_lowercase();
        if lk.contains("bit rate") || lk.contains("bitrate") {
            if let Some(candidate) = extract_bitrate_from_string(v) {
                return candidate;
            }
        }
    }
    extract_bitrate_from_string(&rec.raw).unwrap_or_default()
}

fn audio_codec(rec: &TrackRecord) -> String {
    let Some(format) = rec.get("Format") else {
        return String::new();
    };
    let mut codec = map_audio_codec(format).to_string();
    if let Some(commercial) = rec.get("Commercial name") {
        codec = commercial
            .replace("Dolby Digital Plus with Dolby Atmos", "Dolby Atmos")
            .trim()
            .to_string();
    }
    codec
}

fn infer_bitrate(codec: &str, channels: &str) -> &'static str {
    let upper = codec.to_uppercase();
    if upper.contains("HE-AAC") || upper.contains("HE AAC") {
        match channels {
            "2.0" => "96kb/s",
            "5.1" => "192kb/s",
            "7.1" => "256kb/s",
            _ => "",
        }
    } else if upper.contains("AAC") {
        match channels {
            "2.0" => "128kb/s",
            "5.1" => "320kb/s",
            "7.1" => "448kb/s",
            _ => "",
        }
    } else if upper.contains("ATMOS") {
        "768kb/s"
    } else if upper.contains("DDP") || upper.contains("DD+") || upper.contains("E-AC-3") {
        match channels {
            "5.1" => "640kb/s",
            _ => "",
        }
    } else {
        ""
    }
}

/// Partition diagnostic text into tracks and summarise every audio track.
/// Returns None on empty input.
pub fn parse_file_info(text: &str) -> Option<MediaSummary> {
    if text.is_empty() {
        return None;
    }

    let records: Vec<TrackRecord> = text.split("\n\n").filter_map(TrackRecord::parse).collect();

    // First record with a Duration is the general track; first with
    // dimensions or a known video format is the video track.
    let general = records.iter().find(|r| r.has("Duration"));
    let video = records.iter().find(|r| {
        r.has("Height") || r.has("Width") || r.get("Format").and_then(map_video_codec).is_some()
    });

    let duration_seconds = general
        .and_then(|g| g.get("Duration"))
        .and_then(parse_duration_to_seconds);
    let video_codec = video
        .and_then(|v| v.get("Format"))
        .and_then(map_video_codec)
        .map(str::to_string);

    let mut audio_tracks = Vec::new();
    for rec in &records {
        let Some(raw_channels) = rec.get("Channel(s)") else {
            continue;
        };
        let channels = map_channels(raw_channels.replace(" channels", "").as_str());
        let language = rec.get("Language").unwrap_or_default().to_string();
        let codec = audio_codec(rec);
        let mut bitrate = audio_bitrate(rec);
        if bitrate.is_empty() {
            bitrate = infer_bitrate(&codec, &channels).to_string();
        }
        audio_tracks.push(AudioTrack {
            index: audio_tracks.len() + 1,
            channels,
            bitrate,
            language,
            codec,
        });
    }

    let mut summary = String::new();
    if !audio_tracks.is_empty() {
        summary.push_str("🎧 <b>Audio:</b>\n");
    }
    for track in &audio_tracks {
        let mut line = format!("{}. {} ", track.index, track.language);
        if !track.codec.is_empty() {
            line.push_str(&format!("| {} ", track.codec));
        }
        if !track.channels.is_empty() {
            line.push_str(&format!("{} ", track.channels));
        }
        if !track.bitrate.is_empty() {
            line.push_str(&format!("@ {}", track.bitrate));
        }
        summary.push_str(&format!("<b>{}</b>\n", line.trim()));
    }

    let primary_audio_language = audio_tracks
        .first()
        .map(|t| t.language.clone())
        .filter(|l| !l.is_empty());

    Some(MediaSummary {
        summary,
        primary_audio_language,
        duration_seconds,
        video_codec,
        audio_tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "General\nComplete name : /films/movie.mkv\nDuration : 2 h 5 mn\n\n\
Video\nFormat : HEVC\nWidth : 1 920 pixels\nHeight : 1 080 pixels\n\n\
Audio\nFormat : AC-3\nChannel(s) : 6 channels\nLanguage : Hindi\n";

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse_file_info("").is_none());
    }

    #[test]
    fn end_to_end_single_audio_track() {
        let info = parse_file_info(SAMPLE).unwrap();
        assert_eq!(info.summary, "🎧 <b>Audio:</b>\n<b>1. Hindi | DD 5.1</b>\n");
        assert_eq!(info.primary_audio_language.as_deref(), Some("Hindi"));
        assert_eq!(info.duration_seconds, Some(7500));
        assert_eq!(info.video_codec.as_deref(), Some("H.265"));
    }

    #[test]
    fn idempotent_on_same_input() {
        assert_eq!(parse_file_info(SAMPLE), parse_file_info(SAMPLE));
    }

    #[test]
    fn channel_mapping_is_exact() {
        for (raw, want) in [("2", "2.0"), ("6", "5.1"), ("8", "7.1"), ("7", "7")] {
            let text = format!("Audio\nChannel(s) : {raw} channels\n");
            let info = parse_file_info(&text).unwrap();
            assert_eq!(info.audio_tracks[0].channels, want);
        }
    }

    #[test]
    fn labeled_bitrate_beats_raw_text_scan() {
        let text = "Audio\nFormat : AAC LC\nChannel(s) : 2 channels\n\
Bit rate : 128 kb/s\nTitle : stream 320 kb/s variant\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].bitrate, "128kb/s");
    }

    #[test]
    fn last_match_within_a_field_wins() {
        let text = "Audio\nChannel(s) : 6 channels\n\
Bit rate : 384 kb/s / 640 kb/s\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].bitrate, "640kb/s");
    }

    #[test]
    fn raw_text_scan_as_fallback() {
        let text = "Audio\nFormat : AC-3\nChannel(s) : 6 channels\nNote x : around 448 kbps nominal\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].bitrate, "448kb/s");
    }

    #[test]
    fn kbps_normalised_and_spaces_stripped() {
        assert_eq!(
            extract_bitrate_from_string("Maximum : 3 072 Kbps").as_deref(),
            Some("3072kb/s")
        );
        assert_eq!(
            extract_bitrate_from_string("24.0 Mb/s").as_deref(),
            Some("24.0mb/s")
        );
        assert_eq!(extract_bitrate_from_string("no rate here"), None);
    }

    #[test]
    fn inference_table() {
        let cases = [
            ("E-AC-3 JOC", "8", "Dolby Digital Plus with Dolby Atmos", "768kb/s"),
            ("AAC LC", "6", "", "320kb/s"),
            ("E-AC-3", "6", "", "640kb/s"),
            ("E-AC-3", "2", "", ""),
            ("AC-3", "6", "", ""),
        ];
        for (format, channels, commercial, want) in cases {
            let mut text = format!("Audio\nFormat : {format}\nChannel(s) : {channels} channels\n");
            if !commercial.is_empty() {
                text.push_str(&format!("Commercial name : {commercial}\n"));
            }
            let info = parse_file_info(&text).unwrap();
            assert_eq!(info.audio_tracks[0].bitrate, want, "format={format}");
        }
    }

    #[test]
    fn atmos_inference_applies_to_any_layout() {
        let text = "Audio\nFormat : E-AC-3 JOC\nChannel(s) : 2 channels\n\
Commercial name : Dolby Digital Plus with Dolby Atmos\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].codec, "Dolby Atmos");
        assert_eq!(info.audio_tracks[0].bitrate, "768kb/s");
    }

    #[test]
    fn he_aac_has_its_own_rates() {
        let text = "Audio\nFormat : AAC LC\nChannel(s) : 2 channels\n\
Commercial name : HE-AAC\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].bitrate, "96kb/s");
    }

    #[test]
    fn commercial_name_overrides_format_map() {
        let text = "Audio\nFormat : E-AC-3\nChannel(s) : 6 channels\n\
Commercial name : Dolby Digital Plus\nBit rate : 640 kb/s\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks[0].codec, "Dolby Digital Plus");
    }

    #[test]
    fn multiple_audio_tracks_keep_document_order() {
        let text = "General\nDuration : 1 h\n\n\
Audio #1\nFormat : AAC LC\nChannel(s) : 2 channels\nLanguage : Tamil\n\n\
Audio #2\nFormat : AC-3\nChannel(s) : 6 channels\nLanguage : English\nBit rate : 448 kb/s\n";
        let info = parse_file_info(text).unwrap();
        assert_eq!(info.audio_tracks.len(), 2);
        assert_eq!(info.audio_tracks[0].index, 1);
        assert_eq!(info.audio_tracks[1].index, 2);
        assert_eq!(info.primary_audio_language.as_deref(), Some("Tamil"));
        assert!(info.summary.contains("<b>1. Tamil | AAC 2.0 @ 128kb/s</b>"));
        assert!(info.summary.contains("<b>2. English | DD 5.1 @ 448kb/s</b>"));
    }

    #[test]
    fn missing_language_still_listed() {
        let text = "Audio\nFormat : AAC LC\nChannel(s) : 2 channels\n";
        let info = parse_file_info(text).unwrap();
        assert!(info.primary_audio_language.is_none());
        assert!(info.summary.contains("1.  | AAC 2.0 @ 128kb/s"));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;

static MULTI_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
static BRACKET_JOIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*-\s*\[").unwrap());
static FOLDER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^📁\s*").unwrap());

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn collapse_spaces(s: &str) -> String {
    MULTI_SPACE_RE.replace_all(s, " ").into_owned()
}

pub fn header_line(title: &str, year: &str) -> String {
    format!("<b>🎬 {title} - ({year})</b>")
}

pub fn ensure_line_bold(line: &str) -> String {
    let stripped = line.trim();
    if stripped.is_empty() {
        return line.to_string();
    }
    if stripped.starts_with("<b>") && stripped.ends_with("</b>") {
        return line.to_string();
    }
    format!("<b>{stripped}</b>")
}

/// Escape and bold every non-blank line of user-supplied body text.
pub fn boldify_body(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            out.push(String::new());
            continue;
        }
        let esc = escape_html(line.trim_end());
        if esc.starts_with("<b>") && esc.ends_with("</b>") {
            out.push(esc);
        } else {
            out.push(format!("<b>{esc}</b>"));
        }
    }
    out.join("\n")
}

pub fn make_full_bold(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.lines()
        .map(|line| {
            let line = line.trim();
            if line.is_empty() {
                String::new()
            } else if line.starts_with("<b>") && line.ends_with("</b>") {
                line.to_string()
            } else {
                format!("<b>{line}</b>")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-bold a cached caption before reposting it under a new poster.
pub fn boldify_full_caption(base: &str) -> String {
    base.lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                ensure_line_bold(&BRACKET_JOIN_RE.replace_all(l, " [").into_owned())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reduce a cached caption to its header block: drop language/source lines,
/// strip the folder marker and normalise the `name - [size]` join.
pub fn build_header_from_text(base_text: &str) -> Option<String> {
    if base_text.is_empty() {
        return None;
    }
    let header_block = base_text.split("\n\n").next().unwrap_or(base_text);
    let mut filtered = Vec::new();
    for l in header_block.lines() {
        let s = l.trim();
        if s.is_empty() {
            filtered.push(String::new());
            continue;
        }
        if s.contains("Language:") || s.contains("Source:") || s.starts_with('🌐') {
            continue;
        }
        if s == "📁" {
            continue;
        }
        let s = FOLDER_PREFIX_RE.replace(s, "").into_owned();
        let s = BRACKET_JOIN_RE.replace_all(&s, " [").into_owned();
        filtered.push(ensure_line_bold(&s));
    }
    if filtered.iter().all(|line| line.trim().is_empty()) {
        return None;
    }
    Some(filtered.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_format() {
        assert_eq!(header_line("Movie", "2021"), "<b>🎬 Movie - (2021)</b>");
        assert_eq!(header_line("Raw.Name", "????"), "<b>🎬 Raw.Name - (????)</b>");
    }

    #[test]
    fn space_collapsing() {
        assert_eq!(collapse_spaces("1.  | DD 5.1"), "1. | DD 5.1");
        assert_eq!(collapse_spaces("no change"), "no change");
    }

    #[test]
    fn bolding_is_idempotent() {
        assert_eq!(ensure_line_bold("<b>done</b>"), "<b>done</b>");
        assert_eq!(ensure_line_bold("plain"), "<b>plain</b>");
        assert_eq!(ensure_line_bold("  "), "  ");
    }

    #[test]
    fn body_is_escaped() {
        assert_eq!(boldify_body("a < b & c"), "<b>a &lt; b &amp; c</b>");
        assert_eq!(boldify_body("one\n\ntwo"), "<b>one</b>\n\n<b>two</b>");
    }

    #[test]
    fn header_filtering() {
        let cached = "🎬 Movie - (2021)\n📁 Movie.2021.mkv - [1.5GB]\n🌐 Language: Hindi\n\n🎧 Audio";
        let header = build_header_from_text(cached).unwrap();
        assert_eq!(
            header,
            "<b>🎬 Movie - (2021)</b>\n<b>Movie.2021.mkv [1.5GB]</b>"
        );
        assert!(build_header_from_text("").is_none());
        assert!(build_header_from_text("Language: x\nSource: y").is_none());
    }

    #[test]
    fn full_caption_bolding() {
        let caption = "Title - [tag]\n\nsecond";
        assert_eq!(boldify_full_caption(caption), "<b>Title [tag]</b>\n\n<b>second</b>");
    }
}

use std::sync::LazyLock;

use regex::{Captures, Regex};
use reqwest::Url;

static URI_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"URI=(?:"([^"']+)"|'([^"']+)')"#).expect("static URI attribute pattern")
});

const MANIFEST_CONTENT_TYPES: &[&str] = &[
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
];

pub fn is_manifest_content_type(content_type: &str) -> bool {
    let value = content_type.to_ascii_lowercase();
    MANIFEST_CONTENT_TYPES.iter().any(|t| value.contains(t))
}

/// Resolves `input` against `base`; unresolvable input is returned as-is.
pub fn to_absolute(input: &str, base: &Url) -> String {
    base.join(input)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| input.to_string())
}

/// Makes every URI in an HLS playlist absolute against `source`.
///
/// `URI="..."`/`URI='...'` attributes are rewritten on every line. Lines that
/// are not tags or comments are replaced by their resolved form. Blank lines
/// are kept verbatim.
pub fn rewrite_manifest(manifest: &str, source: &Url) -> String {
    manifest
        .split('\n')
        .map(|line| rewrite_line(line, source))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line(line: &str, source: &Url) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return line.to_string();
    }

    if trimmed.starts_with('#') {
        return URI_ATTR
            .replace_all(line, |caps: &Captures| {
                let (quote, uri) = match (caps.get(1), caps.get(2)) {
                    (Some(uri), _) => ('"', uri.as_str()),
                    (None, Some(uri)) => ('\'', uri.as_str()),
                    (None, None) => return caps[0].to_string(),
                };
                format!("URI={quote}{}{quote}", to_absolute(uri, source))
            })
            .into_owned();
    }

    to_absolute(trimmed, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Url {
        Url::parse("https://cdn.example.com/hls/show/ep1/master.m3u8?token=abc").unwrap()
    }

    const MASTER: &str = "#EXTM3U\n\
#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"English\",URI=\"subs/en.m3u8\"\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720\n\
720/index.m3u8\n\
\n\
#EXT-X-STREAM-INF:BANDWIDTH=2560000\n\
/abs/1080/index.m3u8\n";

    #[test]
    fn rewrites_variants_and_uri_attributes() {
        let out = rewrite_manifest(MASTER, &source());
        let lines: Vec<&str> = out.split('\n').collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(
            lines[1],
            "#EXT-X-MEDIA:TYPE=SUBTITLES,GROUP-ID=\"subs\",NAME=\"English\",URI=\"https://cdn.example.com/hls/show/ep1/subs/en.m3u8\""
        );
        assert_eq!(lines[2], "#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1280x720");
        assert_eq!(lines[3], "https://cdn.example.com/hls/show/ep1/720/index.m3u8");
        assert_eq!(lines[4], "");
        assert_eq!(lines[6], "https://cdn.example.com/abs/1080/index.m3u8");
        assert_eq!(lines[7], "");
    }

    #[test]
    fn single_quoted_key_uri() {
        let out = rewrite_manifest("#EXT-X-KEY:METHOD=AES-128,URI='../keys/k1.bin'", &source());
        assert_eq!(
            out,
            "#EXT-X-KEY:METHOD=AES-128,URI='https://cdn.example.com/hls/show/keys/k1.bin'"
        );
    }

    #[test]
    fn tags_without_uri_are_untouched() {
        for line in [
            "#EXTINF:10.010,",
            "#EXT-X-TARGETDURATION:10",
            "   #EXT-X-ENDLIST",
            "# a plain comment with spaces",
        ] {
            assert_eq!(rewrite_manifest(line, &source()), line);
        }
    }

    #[test]
    fn whitespace_lines_pass_through() {
        let text = "#EXTM3U\n   \n\t\n";
        assert_eq!(rewrite_manifest(text, &source()), text);
    }

    #[test]
    fn segment_lines_are_trimmed_and_resolved() {
        let out = rewrite_manifest("  seg-001.ts?x=1  \r", &source());
        assert_eq!(out, "https://cdn.example.com/hls/show/ep1/seg-001.ts?x=1");
    }

    #[test]
    fn rewriting_is_idempotent() {
        let once = rewrite_manifest(MASTER, &source());
        let twice = rewrite_manifest(&once, &source());
        assert_eq!(once, twice);
    }

    #[test]
    fn uri_attribute_matches_url_join() {
        for relative in ["a.key", "../b.key", "/c.key", "d/e.key?v=2", "//other.host/f.key"] {
            let line = format!("#EXT-X-KEY:METHOD=AES-128,URI=\"{}\"", relative);
            let out = rewrite_manifest(&line, &source());
            let expected = source().join(relative).unwrap().to_string();
            assert_eq!(out, format!("#EXT-X-KEY:METHOD=AES-128,URI=\"{}\"", expected));
        }
    }

    #[test]
    fn absolute_uris_are_kept() {
        let out = rewrite_manifest("https://other.example.net/seg.ts", &source());
        assert_eq!(out, "https://other.example.net/seg.ts");
    }

    #[test]
    fn manifest_content_types() {
        assert!(is_manifest_content_type("application/vnd.apple.mpegurl"));
        assert!(is_manifest_content_type("Application/X-MpegURL; charset=utf-8"));
        assert!(is_manifest_content_type("audio/mpegurl"));
        assert!(!is_manifest_content_type("video/mp2t"));
    }
}

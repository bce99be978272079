//! Playback manifest decoding
//!
//! The track endpoint returns its manifest base64-encoded. Decoded, it is
//! either JSON (`{"mimeType": "audio/flac", "urls": ["https://..."]}`) or a
//! DASH MPD document. JSON `urls[0]` wins; otherwise the first `http(s)://`
//! URL in the text is used.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;

/// A playable location extracted from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedManifest {
    pub url: String,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonManifest {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    codecs: Option<String>,
    #[serde(default)]
    urls: Vec<String>,
}

/// Decode a base64 manifest into text. Text that is not valid base64 is
/// returned unchanged, since some mirrors inline the manifest.
pub fn decode_manifest_text(manifest: &str) -> String {
    let trimmed = manifest.trim();
    [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(trimmed).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Extract the stream location, or `None` when the manifest has no URL.
pub fn decode_manifest(manifest: &str, declared_mime_type: Option<&str>) -> Option<DecodedManifest> {
    let text = decode_manifest_text(manifest);

    if let Ok(json) = serde_json::from_str::<JsonManifest>(&text) {
        if let Some(url) = json.urls.into_iter().find(|url| !url.trim().is_empty()) {
            return Some(DecodedManifest {
                url,
                mime_type: json.mime_type.or_else(|| declared_mime_type.map(str::to_string)),
                codecs: json.codecs,
            });
        }
    }

    first_http_url(&text).map(|url| DecodedManifest {
        url,
        mime_type: declared_mime_type.map(str::to_string),
        codecs: None,
    })
}

/// First `http://` or `https://` URL in free text. XML `&amp;` is unescaped.
pub fn first_http_url(text: &str) -> Option<String> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()?;

    let rest = &text[start..];
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>'))
        .unwrap_or(rest.len());

    Some(rest[..end].replace("&amp;", "&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        STANDARD.encode(text)
    }

    #[test]
    fn test_json_manifest_prefers_urls() {
        let manifest = encode(
            r#"{"mimeType":"audio/flac","codecs":"flac","encryptionType":"NONE","urls":["https://cdn.example/1.flac?token=a"]}"#,
        );
        let decoded = decode_manifest(&manifest, None).unwrap();
        assert_eq!(decoded.url, "https://cdn.example/1.flac?token=a");
        assert_eq!(decoded.mime_type.as_deref(), Some("audio/flac"));
        assert_eq!(decoded.codecs.as_deref(), Some("flac"));
    }

    #[test]
    fn test_dash_manifest_falls_back_to_first_url() {
        let mpd = r#"<?xml version="1.0"?><MPD><Period><AdaptationSet><Representation><SegmentTemplate initialization="https://cdn.example/init.mp4?a=1&amp;b=2" media="https://cdn.example/$Number$.mp4"/></Representation></AdaptationSet></Period></MPD>"#;
        let decoded = decode_manifest(&encode(mpd), Some("application/dash+xml")).unwrap();
        assert_eq!(decoded.url, "https://cdn.example/init.mp4?a=1&b=2");
        assert_eq!(decoded.mime_type.as_deref(), Some("application/dash+xml"));
    }

    #[test]
    fn test_json_without_urls_falls_back_to_text_scan() {
        let manifest = encode(r#"{"urls":[],"note":"see http://mirror.example/a.flac"}"#);
        let decoded = decode_manifest(&manifest, None).unwrap();
        assert_eq!(decoded.url, "http://mirror.example/a.flac");
    }

    #[test]
    fn test_no_url_at_all() {
        assert_eq!(decode_manifest(&encode("{\"urls\":[]}"), None), None);
        assert_eq!(first_http_url("ftp://nope"), None);
    }

    #[test]
    fn test_unpadded_and_inline_manifests() {
        let unpadded = STANDARD_NO_PAD.encode(r#"{"urls":["https://cdn.example/x"]}"#);
        assert_eq!(decode_manifest(&unpadded, None).unwrap().url, "https://cdn.example/x");

        let inline = r#"{"urls":["https://cdn.example/inline"]}"#;
        assert_eq!(decode_manifest(inline, None).unwrap().url, "https://cdn.example/inline");
    }
}

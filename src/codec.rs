//! Legacy charset codec for the game server's wire format.
//!
//! The server emits every HTML page and script in windows-1251 (single-byte
//! Cyrillic) and expects form submissions in the same encoding. All internal
//! processing happens on `String`, so the filter pipeline decodes at the
//! boundary, transforms, and re-encodes before handing bytes back to the
//! rendering surface.
//!
//! `decode` is deliberately permissive: a response with stray bytes must still
//! reach the renderer, so invalid sequences map to U+FFFD instead of failing.

use encoding_rs::WINDOWS_1251;

/// Decode windows-1251 bytes into a `String`.
///
/// Never fails: malformed sequences are replaced, not rejected, because the
/// rewritten payload must always be deliverable to the surface.
pub fn decode(bytes: &[u8]) -> String {
    let (text, _, had_errors) = WINDOWS_1251.decode(bytes);
    if had_errors {
        tracing::debug!("windows-1251 decode: replaced invalid byte sequences");
    }
    text.into_owned()
}

/// Encode internal text back to windows-1251 bytes.
///
/// Characters outside the encoding's repertoire become numeric character
/// references (`&#NNNN;`), which the legacy markup renders correctly.
pub fn encode(text: &str) -> Vec<u8> {
    let (bytes, _, _) = WINDOWS_1251.encode(text);
    bytes.into_owned()
}

/// Whether a stated content type describes a payload the filter pipeline
/// treats as text (HTML or script). Anything else passes through as-is.
pub fn is_text_content_type(content_type: &str) -> bool {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    matches!(
        ct.as_str(),
        "text/html"
            | "text/plain"
            | "text/javascript"
            | "application/javascript"
            | "application/x-javascript"
    ) || ct.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_cyrillic_text() {
        let text = "Персонаж <b>Торговец</b> предлагает обмен";
        assert_eq!(decode(&encode(text)), text);
    }

    #[test]
    fn round_trips_ascii_markup() {
        let text = "<html><body onload=\"ins_hp(1,2,3,4,10.5,20.5)\"></body></html>";
        assert_eq!(decode(&encode(text)), text);
    }

    #[test]
    fn decode_never_fails_on_arbitrary_bytes() {
        // 0x98 is unmapped in windows-1251; the decoder must still return text.
        let bytes = vec![0xD0u8, 0x98, 0xFF, 0x00, 0x41];
        let text = decode(&bytes);
        assert!(text.contains('A'));
    }

    #[test]
    fn content_type_sniffing() {
        assert!(is_text_content_type("text/html; charset=windows-1251"));
        assert!(is_text_content_type("application/x-javascript"));
        assert!(!is_text_content_type("image/gif"));
        assert!(!is_text_content_type("application/octet-stream"));
    }
}

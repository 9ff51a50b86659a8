use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
    pub used_fallback: bool,
}

/// UTF-8 first (BOM stripped), then strict GBK. `None` when neither decodes cleanly.
pub fn decode_text(bytes: &[u8]) -> Option<DecodedText> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(body) {
        return Some(DecodedText {
            text: text.to_string(),
            encoding: "UTF-8",
            used_fallback: false,
        });
    }

    encoding_rs::GBK
        .decode_without_bom_handling_and_without_replacement(body)
        .map(Cow::into_owned)
        .map(|text| DecodedText {
            text,
            encoding: "GBK",
            used_fallback: true,
        })
}

#[cfg(test)]
mod tests {
    use super::decode_text;

    #[test]
    fn utf8_bom_is_stripped() {
        let decoded = decode_text(b"\xEF\xBB\xBFhello").expect("valid utf-8");
        assert_eq!(decoded.text, "hello");
        assert!(!decoded.used_fallback);
    }

    #[test]
    fn empty_input_decodes_to_empty_text() {
        let decoded = decode_text(b"").expect("empty is valid utf-8");
        assert_eq!(decoded.text, "");
    }

    #[test]
    fn gbk_fallback_is_flagged() {
        let (encoded, _, _) = encoding_rs::GBK.encode("豆包编程助手");
        let decoded = decode_text(&encoded).expect("valid gbk");
        assert_eq!(decoded.text, "豆包编程助手");
        assert_eq!(decoded.encoding, "GBK");
        assert!(decoded.used_fallback);
    }

    #[test]
    fn bom_is_stripped_before_gbk_fallback() {
        let (encoded, _, _) = encoding_rs::GBK.encode("汽车");
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(&encoded);

        let decoded = decode_text(&bytes).expect("bom followed by gbk");
        assert_eq!(decoded.text, "汽车");
        assert_eq!(decoded.encoding, "GBK");
    }

    #[test]
    fn invalid_bytes_in_both_encodings_are_rejected() {
        assert!(decode_text(&[0xff, 0xff, 0xff]).is_none());
    }
}

//! Transport-safe encoding for image bytes carried inside the event.
//!
//! Standard alphabet, padded base64. Decoding tolerates ASCII whitespace so
//! MIME-style wrapped payloads still decode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Encode raw bytes for the `image_data` field.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode an `image_data` field back into raw bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if text.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        return STANDARD.decode(compact);
    }
    STANDARD.decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_is_ascii() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let text = encode(&png_magic);
        assert_eq!(text, "iVBORw0KGgo=");
        assert!(text.is_ascii());
    }

    #[test]
    fn decode_ignores_line_breaks() {
        let wrapped = "iVBO\nRw0K\r\nGgo=";
        assert_eq!(
            decode(wrapped).unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
        );
    }

    #[test]
    fn decode_rejects_invalid_alphabet() {
        assert!(decode("not*base64!").is_err());
    }

    #[test]
    fn decode_empty() {
        assert!(decode("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}

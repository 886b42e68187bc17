//! Inline (`data:` URL) payload encoding.

use base64::{Engine as _, engine::general_purpose};

/// Encode bytes as `data:<content_type>;base64,<...>`.
pub fn encode_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        content_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 data URL into its content type and decoded bytes.
pub fn decode_data_url(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let content_type = meta.strip_suffix(";base64")?;
    let bytes = general_purpose::STANDARD.decode(data).ok()?;
    Some((content_type.to_string(), bytes))
}

/// Hex MD5 of a payload.
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_shape() {
        let url = encode_data_url("image/png", b"\x89PNG");
        assert!(url.starts_with("data:image/png;base64,"));
        let (content_type, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn non_base64_urls_are_rejected() {
        assert!(decode_data_url("https://cdn.example/a.png").is_none());
        assert!(decode_data_url("data:text/plain,hello").is_none());
    }

    #[test]
    fn checksum_is_hex_md5() {
        assert_eq!(checksum(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }
}

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

const PREFIX: &str = "z:";

/// Compresses `text` into the `z:` + base64(deflate(utf8)) wire format.
pub fn compress(text: &str) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    // Writing to an in-memory Vec never fails.
    encoder.write_all(text.as_bytes()).expect("in-memory deflate write");
    let bytes = encoder.finish().expect("in-memory deflate finish");
    format!("{PREFIX}{}", BASE64.encode(bytes))
}

/// Decompresses a value produced by [`compress`]. Values without the `z:` prefix are assumed to
/// be legacy plaintext and returned unchanged, so old rows keep reading correctly after this
/// format was introduced.
pub fn decompress(stored: &str) -> String {
    let Some(encoded) = stored.strip_prefix(PREFIX) else {
        return stored.to_string();
    };

    let Ok(compressed) = BASE64.decode(encoded) else {
        return stored.to_string();
    };

    let mut decoder = DeflateDecoder::new(compressed.as_slice());
    let mut out = String::new();
    match decoder.read_to_string(&mut out) {
        Ok(_) => out,
        Err(_) => stored.to_string(),
    }
}

pub fn is_compressed(stored: &str) -> bool {
    stored.starts_with(PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_text() {
        let long_article = "a very long article ".repeat(200);
        let samples = [
            "",
            "hello world",
            long_article.as_str(),
            "unicode: café, naïve, 日本語",
        ];
        for s in samples {
            let c = compress(s);
            assert!(is_compressed(&c) || s.is_empty());
            assert_eq!(decompress(&c), s);
        }
    }

    #[test]
    fn passes_through_legacy_plaintext() {
        let legacy = "plain uncompressed content, no prefix";
        assert_eq!(decompress(legacy), legacy);
    }

    #[test]
    fn falls_back_on_corrupt_payload() {
        let corrupt = "z:not-valid-base64!!!";
        assert_eq!(decompress(corrupt), corrupt);
    }
}

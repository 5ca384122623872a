//! Content-type detection from the leading bytes of an upload
//!
//! Binary formats are recognized by their magic numbers. Anything that looks
//! like text falls back to the destination key's extension (via `mime_guess`)
//! and then to `text/plain; charset=utf-8`; unrecognized binary data becomes
//! `application/octet-stream`.

/// Number of leading bytes considered
pub const SNIFF_LEN: usize = 512;

const OCTET_STREAM: &str = "application/octet-stream";
const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// (offset, signature, mime type)
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"%PDF-", "application/pdf"),
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"BM", "image/bmp"),
    (0, b"\x1f\x8b\x08", "application/x-gzip"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"\x28\xb5\x2f\xfd", "application/zstd"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed"),
    (0, b"Rar!\x1a\x07", "application/x-rar-compressed"),
    (0, b"OggS\x00", "application/ogg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"\x00asm", "application/wasm"),
    (0, b"\x1aE\xdf\xa3", "video/webm"),
    (0, b"\x7fELF", "application/x-executable"),
    (0, b"SQLite format 3\x00", "application/vnd.sqlite3"),
    (257, b"ustar", "application/x-tar"),
    (4, b"ftyp", "video/mp4"),
];

/// Detect the MIME type of `data`, using `key` as a hint for text content
pub fn detect_content_type(data: &[u8], key: &str) -> String {
    let head = &data[..data.len().min(SNIFF_LEN)];

    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        return "image/webp".to_string();
    }
    if head.len() >= 12 && &head[0..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        return "audio/wav".to_string();
    }

    if let Some((_, _, mime)) = SIGNATURES.iter().find(|(offset, magic, _)| {
        head.get(*offset..offset + magic.len())
            .is_some_and(|window| window == *magic)
    }) {
        return mime.to_string();
    }

    if looks_like_text(head) {
        guess_from_key(key)
            .filter(|mime| mime.type_() == mime_guess::mime::TEXT || is_textual_application(mime))
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| TEXT_PLAIN.to_string())
    } else {
        guess_from_key(key)
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| OCTET_STREAM.to_string())
    }
}

fn guess_from_key(key: &str) -> Option<mime_guess::Mime> {
    mime_guess::from_path(key).first()
}

fn is_textual_application(mime: &mime_guess::Mime) -> bool {
    mime.type_() == mime_guess::mime::APPLICATION
        && matches!(
            mime.subtype().as_str(),
            "json" | "xml" | "javascript" | "toml" | "x-sh" | "sql" | "yaml"
        )
}

/// UTF-8 (a truncated trailing sequence is tolerated) without binary control bytes
fn looks_like_text(head: &[u8]) -> bool {
    let valid = match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && head.len() == SNIFF_LEN,
    };
    valid
        && !head
            .iter()
            .any(|&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_numbers() {
        assert_eq!(detect_content_type(b"%PDF-1.7\n...", "x"), "application/pdf");
        assert_eq!(
            detect_content_type(b"\x89PNG\r\n\x1a\n\x00\x00", "x"),
            "image/png"
        );
        assert_eq!(
            detect_content_type(b"\x1f\x8b\x08\x00\x00\x00", "dump.rdb.gz"),
            "application/x-gzip"
        );
    }

    #[test]
    fn test_tar_signature_at_offset() {
        let mut data = vec![0u8; 600];
        data[257..262].copy_from_slice(b"ustar");
        assert_eq!(detect_content_type(&data, "backup"), "application/x-tar");
    }

    #[test]
    fn test_text_uses_key_extension() {
        assert_eq!(
            detect_content_type(b"{\"a\": 1}", "config.json"),
            "application/json"
        );
        assert_eq!(detect_content_type(b"hello world\n", "notes"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"body { }", "site.css"), "text/css");
    }

    #[test]
    fn test_text_with_binary_extension_stays_text() {
        assert_eq!(detect_content_type(b"plain words", "photo.png"), TEXT_PLAIN);
    }

    #[test]
    fn test_unknown_binary() {
        assert_eq!(
            detect_content_type(&[0u8, 1, 2, 3, 0xfe], "blob"),
            OCTET_STREAM
        );
    }

    #[test]
    fn test_truncated_utf8_at_sniff_boundary_is_text() {
        let mut data = vec![b'a'; SNIFF_LEN - 1];
        data.extend_from_slice("é".as_bytes());
        assert_eq!(detect_content_type(&data, "readme"), TEXT_PLAIN);
    }
}

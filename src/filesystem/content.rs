//! Text detection and decoding for file reads and in-process search

use std::path::Path;

use tokio::fs;

use crate::protocol::ToolError;

use super::config::TEXT_SAMPLE_SIZE;

/// A file decoded to text, with the encoding that was detected
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
}

impl DecodedText {
    pub fn lines(&self) -> Vec<&str> {
        split_lines(&self.text)
    }
}

/// Read a whole file as text, rejecting directories and binary content.
///
/// `display_path` is the root-relative form used in error messages.
pub async fn read_text_file(path: &Path, display_path: &str) -> Result<DecodedText, ToolError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ToolError::from_file_io(&e, display_path))?;
    if metadata.is_dir() {
        return Err(ToolError::IsADirectory {
            path: display_path.to_string(),
        });
    }

    let buffer = fs::read(path)
        .await
        .map_err(|e| ToolError::from_file_io(&e, display_path))?;

    let sample = &buffer[..buffer.len().min(TEXT_SAMPLE_SIZE)];
    if !is_probably_text(sample) {
        return Err(ToolError::BinaryFile {
            path: display_path.to_string(),
        });
    }

    Ok(decode_text_buffer(&buffer))
}

/// Best-effort heuristic for deciding if a leading sample is text.
pub fn is_probably_text(sample: &[u8]) -> bool {
    if sample.is_empty() {
        return true;
    }

    // UTF-16 BOMs are text even though the payload is full of NULs.
    if sample.starts_with(&[0xFF, 0xFE]) || sample.starts_with(&[0xFE, 0xFF]) {
        return true;
    }

    // NUL is a strong binary signal.
    if sample.contains(&0) {
        return false;
    }

    if let Some(kind) = infer::get(sample) {
        if !matches!(kind.matcher_type(), infer::MatcherType::Text) {
            return false;
        }
    }

    // Invalid UTF-8 sequences and stray control bytes both count against the
    // sample; a cut multi-byte char at the sample edge does not.
    let mut suspicious = 0usize;
    let mut rest = sample;
    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                suspicious += count_control_bytes(valid.as_bytes());
                break;
            }
            Err(e) => {
                let (valid, after) = rest.split_at(e.valid_up_to());
                suspicious += count_control_bytes(valid);
                match e.error_len() {
                    Some(len) => {
                        suspicious += len;
                        rest = &after[len..];
                    }
                    None => break,
                }
            }
        }
    }

    // If >10% of bytes look wrong, treat as binary.
    suspicious * 10 <= sample.len()
}

fn count_control_bytes(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
        .count()
}

pub fn decode_text_buffer(buffer: &[u8]) -> DecodedText {
    if buffer.starts_with(&[0xEF, 0xBB, 0xBF]) {
        if let Ok(content) = std::str::from_utf8(&buffer[3..]) {
            return DecodedText {
                text: content.to_string(),
                encoding: "utf-8-sig",
            };
        }
    }

    if let Ok(content) = std::str::from_utf8(buffer) {
        return DecodedText {
            text: content.to_string(),
            encoding: "utf-8",
        };
    }

    if buffer.starts_with(&[0xFF, 0xFE]) {
        let utf16: Vec<u16> = buffer[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if let Ok(content) = String::from_utf16(&utf16) {
            return DecodedText {
                text: content,
                encoding: "utf-16le",
            };
        }
    }

    if buffer.starts_with(&[0xFE, 0xFF]) {
        let utf16: Vec<u16> = buffer[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(content) = String::from_utf16(&utf16) {
            return DecodedText {
                text: content,
                encoding: "utf-16be",
            };
        }
    }

    DecodedText {
        text: String::from_utf8_lossy(buffer).into_owned(),
        encoding: "utf-8",
    }
}

/// Split into lines, keeping each line's terminator.
///
/// The piece count equals `str::lines().count()`, so ranges cut from this
/// agree with line numbers reported by search.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_text() {
        assert!(is_probably_text(b"fn main() {\n    println!(\"hi\");\n}\n"));
        assert!(is_probably_text(b""));
    }

    #[test]
    fn test_nul_bytes_are_binary() {
        assert!(!is_probably_text(b"abc\0def"));
    }

    #[test]
    fn test_known_binary_signature_is_binary() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
        assert!(!is_probably_text(&png));
    }

    #[test]
    fn test_truncated_multibyte_at_sample_edge_is_text() {
        let text = "plain text ending in é";
        let bytes = text.as_bytes();
        // Cut inside the trailing two-byte char.
        let cut = &bytes[..bytes.len() - 1];
        assert!(is_probably_text(cut));
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut buffer = vec![0xFF, 0xFE];
        for unit in "hi\n".encode_utf16() {
            buffer.extend_from_slice(&unit.to_le_bytes());
        }
        assert!(is_probably_text(&buffer));
        let decoded = decode_text_buffer(&buffer);
        assert_eq!(decoded.text, "hi\n");
        assert_eq!(decoded.encoding, "utf-16le");
    }

    #[test]
    fn test_decode_utf8_bom_is_stripped() {
        let decoded = decode_text_buffer(b"\xEF\xBB\xBFname = 1\n");
        assert_eq!(decoded.text, "name = 1\n");
        assert_eq!(decoded.encoding, "utf-8-sig");
    }

    #[test]
    fn test_split_lines_matches_lines_count() {
        for text in ["", "a", "a\n", "a\nb", "a\r\nb\r\n", "\n\n"] {
            assert_eq!(split_lines(text).len(), text.lines().count(), "{:?}", text);
        }
    }
}

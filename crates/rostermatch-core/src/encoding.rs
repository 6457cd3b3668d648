use std::fs;
use std::path::Path;

use encoding_rs::WINDOWS_1251;
use tracing::debug;

use crate::error::{CoreError, Result};

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// A codec candidate for the ordered decode-fallback list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8, leading byte-order mark stripped when present.
    Utf8Bom,
    Utf8,
    /// Legacy single-byte Cyrillic encoding.
    Windows1251,
}

impl TextEncoding {
    pub const DEFAULT_ORDER: [TextEncoding; 3] = [
        TextEncoding::Utf8Bom,
        TextEncoding::Utf8,
        TextEncoding::Windows1251,
    ];

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8-bom" | "utf-8-sig" => Some(TextEncoding::Utf8Bom),
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "windows-1251" | "cp1251" => Some(TextEncoding::Windows1251),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextEncoding::Utf8Bom => "utf-8-bom",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1251 => "windows-1251",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8Bom => {
                let stripped = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(stripped).ok().map(str::to_owned)
            }
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_owned),
            TextEncoding::Windows1251 => {
                let (text, _, had_errors) = WINDOWS_1251.decode(bytes);
                if had_errors {
                    return None;
                }
                Some(text.into_owned())
            }
        }
    }
}

/// Decode `path` with the first codec in `encodings` that accepts the whole
/// byte stream; exhausting the list is a [`CoreError::Decode`].
pub fn read_to_string_with_fallback(path: &Path, encodings: &[TextEncoding]) -> Result<String> {
    let bytes = fs::read(path)?;
    for encoding in encodings {
        match encoding.decode(&bytes) {
            Some(text) => {
                debug!(path = %path.display(), encoding = encoding.name(), "decoded input file");
                return Ok(text);
            }
            None => {
                debug!(
                    path = %path.display(),
                    encoding = encoding.name(),
                    "decode failed, trying next encoding"
                );
            }
        }
    }
    Err(CoreError::Decode(path.to_path_buf()))
}

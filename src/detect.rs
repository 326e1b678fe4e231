//! Input decoding and content sniffing.

use crate::error::{Error, Result};
use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// How far into the input a declared charset is looked for.
const DECLARATION_WINDOW: usize = 1024;

/// Decoded input text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// The text
    pub text: String,
    /// Name of the encoding used
    pub encoding: &'static str,
    /// Whether invalid sequences were replaced
    pub had_errors: bool,
}

/// Decode raw input bytes.
///
/// Order: byte order mark, strict UTF-8, a charset declared by an HTML
/// `<meta>` or XML prolog, then UTF-8 with replacement characters.
///
/// # Example
/// ```
/// use docmark::detect::decode_bytes;
///
/// let decoded = decode_bytes("héllo".as_bytes());
/// assert_eq!(decoded.text, "héllo");
/// assert_eq!(decoded.encoding, "UTF-8");
/// ```
pub fn decode_bytes(bytes: &[u8]) -> DecodedText {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return DecodedText {
            text: text.into_owned(),
            encoding: encoding.name(),
            had_errors,
        };
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return DecodedText {
            text: text.to_string(),
            encoding: UTF_8.name(),
            had_errors: false,
        };
    }

    if let Some(encoding) = declared_charset(bytes) {
        if encoding != UTF_8 {
            log::debug!("Decoding with declared charset {}", encoding.name());
            let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
            return DecodedText {
                text: text.into_owned(),
                encoding: encoding.name(),
                had_errors,
            };
        }
    }

    log::debug!("Input is not valid UTF-8, decoding with replacement");
    let (text, _) = UTF_8.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding: UTF_8.name(),
        had_errors: true,
    }
}

/// Decode with an explicit encoding label such as `latin1` or `shift_jis`.
pub fn decode_with_label(bytes: &[u8], label: &str) -> Result<DecodedText> {
    let encoding = Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Encoding(format!("unknown encoding label '{}'", label)))?;
    let (text, used, had_errors) = encoding.decode(bytes);
    Ok(DecodedText {
        text: text.into_owned(),
        encoding: used.name(),
        had_errors,
    })
}

fn declared_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    static META: OnceLock<Regex> = OnceLock::new();
    static PROLOG: OnceLock<Regex> = OnceLock::new();

    let head = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    let meta = META.get_or_init(|| {
        Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([A-Za-z0-9_\-:.]+)"#)
            .expect("charset pattern is valid")
    });
    let prolog = PROLOG.get_or_init(|| {
        Regex::new(r#"(?i)<\?xml[^>]*encoding\s*=\s*["']([A-Za-z0-9_\-.]+)"#)
            .expect("prolog pattern is valid")
    });

    [prolog, meta]
        .iter()
        .filter_map(|re| re.captures(head))
        .filter_map(|caps| caps.get(1))
        .find_map(|label| Encoding::for_label(label.as_bytes()))
}

/// Lowercased extension of a path, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Content with leading whitespace and a BOM removed, lowercased prefix.
pub(crate) fn content_head(content: &str, len: usize) -> String {
    content
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(len)
        .collect::<String>()
        .to_lowercase()
}

/// Whether text looks like it came from a binary file.
pub(crate) fn looks_binary(content: &str) -> bool {
    content.contains('\0')
}

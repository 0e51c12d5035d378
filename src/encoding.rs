//! Byte-level encoding recovery for bank exports.
//!
//! CGD exports arrive as UTF-8 (with or without a BOM), UTF-16, or a legacy
//! single-byte code page depending on which browser and export button was
//! used. Everything downstream works on UTF-8, so the raw bytes are sniffed
//! and decoded here before the CSV layer ever sees them.

use std::borrow::Cow;
use std::io::Read;

use anyhow::Context;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, WINDOWS_1254};
use tracing::debug;

use crate::error::Result;

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];

/// How many bytes are inspected for BOM and charset heuristics.
const SNIFF_LEN: usize = 4096;

/// Read a byte source fully and decode it to UTF-8.
///
/// Only fails when the underlying reader fails; an ambiguous encoding falls
/// back to Windows-1252 rather than aborting the import.
pub fn read_to_utf8<R: Read>(mut r: R) -> Result<String> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes).context("reading statement bytes")?;

    Ok(decode_to_utf8(&bytes).into_owned())
}

/// Decode statement bytes to UTF-8.
///
/// Detection order:
///  1. BOM (UTF-8 BOM is stripped; UTF-16 LE/BE is decoded)
///  2. Content that validates as UTF-8 passes through unmodified
///  3. Statistical charset detection over a bounded prefix
///  4. Fallback to Windows-1252
pub fn decode_to_utf8(bytes: &[u8]) -> Cow<'_, str> {
    if let Some(rest) = bytes.strip_prefix(BOM_UTF8) {
        return String::from_utf8_lossy(rest);
    }

    if bytes.starts_with(BOM_UTF16_LE) {
        let (text, _, _) = UTF_16LE.decode(bytes);
        return text;
    }

    if bytes.starts_with(BOM_UTF16_BE) {
        let (text, _, _) = UTF_16BE.decode(bytes);
        return text;
    }

    let prefix = &bytes[..bytes.len().min(SNIFF_LEN)];
    if prefix_is_utf8(prefix) {
        return String::from_utf8_lossy(bytes);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(prefix, bytes.len() <= SNIFF_LEN);

    let guessed = detector.guess(None, true);
    debug!(charset = guessed.name(), "detected legacy charset");

    if guessed == UTF_8 {
        return String::from_utf8_lossy(bytes);
    }

    // ISO-8859-9 maps to the windows-1254 decoder in the Encoding Standard.
    let encoding: &'static Encoding = if guessed == WINDOWS_1252 || guessed == WINDOWS_1254 {
        guessed
    } else {
        WINDOWS_1252
    };

    let (text, _, _) = encoding.decode(bytes);
    text
}

/// UTF-8 validity over a truncated prefix. A multi-byte sequence cut at the
/// sniff boundary is incomplete, not invalid.
fn prefix_is_utf8(prefix: &[u8]) -> bool {
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

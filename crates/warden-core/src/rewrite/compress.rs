//! Content-Encoding decode table (§4.6).
//!
//! The core only ever needs to read a response body to rewrite it; once
//! rewritten, the response is re-sent as `identity` (the caller drops the
//! `Content-Encoding` header and recomputes `Content-Length`) rather than
//! recompressed, so this module is decode-only.

use std::io::Read;

use crate::error::{Result, WardenError};

pub fn decode_body(content_encoding: &str, body: &[u8]) -> Result<Vec<u8>> {
    match content_encoding.trim().to_ascii_lowercase().as_str() {
        "" | "identity" => Ok(body.to_vec()),
        "gzip" | "x-gzip" => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| WardenError::Rewrite(format!("gzip decode: {e}")))?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::new();
            flate2::read::DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| WardenError::Rewrite(format!("deflate decode: {e}")))?;
            Ok(out)
        }
        "br" => {
            let mut out = Vec::new();
            brotli::Decompressor::new(body, 4096)
                .read_to_end(&mut out)
                .map_err(|e| WardenError::Rewrite(format!("brotli decode: {e}")))?;
            Ok(out)
        }
        "zstd" => zstd::stream::decode_all(body)
            .map_err(|e| WardenError::Rewrite(format!("zstd decode: {e}"))),
        other => Err(WardenError::Rewrite(format!(
            "unsupported content-encoding: {other}"
        ))),
    }
}

/// Decode a response body using `encoding_rs`'s detected charset, falling
/// back to UTF-8 with lossy replacement when the declared charset is
/// missing or unrecognized.
pub fn decode_charset(bytes: &[u8], declared_charset: Option<&str>) -> String {
    let encoding = declared_charset
        .and_then(encoding_rs::Encoding::for_label_no_replacement)
        .unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

//! Magnet URI helpers: info-hash extraction and normalisation.

use thiserror::Error;
use url::Url;

const BTIH_PREFIX: &str = "urn:btih:";

/// Errors raised while extracting an info-hash from a magnet URI.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MagnetError {
    /// The input did not parse as a URI.
    #[error("magnet uri did not parse")]
    Unparsable,
    /// The URI scheme was not `magnet`.
    #[error("invalid magnet uri scheme")]
    InvalidScheme,
    /// No usable `xt=urn:btih:` parameter was present.
    #[error("btih magnet xt not present")]
    MissingInfoHash,
}

/// Extract the v1 info-hash from a magnet URI as lowercase hex.
///
/// Accepts the 40-character hex form (any case) and the 32-character
/// unpadded base32 form; both normalise to the same lowercase hex digest.
///
/// # Errors
///
/// Returns an error when the URI does not parse, is not a magnet link, or
/// carries no decodable `urn:btih` parameter.
pub fn info_hash_from_magnet(uri: &str) -> Result<String, MagnetError> {
    let parsed = Url::parse(uri).map_err(|_| MagnetError::Unparsable)?;
    if parsed.scheme() != "magnet" {
        return Err(MagnetError::InvalidScheme);
    }

    for (key, value) in parsed.query_pairs() {
        if key != "xt" {
            continue;
        }
        let lowered = value.to_ascii_lowercase();
        if !lowered.starts_with(BTIH_PREFIX) {
            continue;
        }
        let hash = value.as_ref()[BTIH_PREFIX.len()..].trim();
        if hash.is_empty() {
            continue;
        }

        if hash.len() == 40 {
            if let Ok(bytes) = hex::decode(hash) {
                if bytes.len() == 20 {
                    return Ok(hash.to_ascii_lowercase());
                }
            }
        }

        if let Some(digest) = decode_base32_20(hash.trim_end_matches('=')) {
            return Ok(hex::encode(digest));
        }
    }

    Err(MagnetError::MissingInfoHash)
}

/// Decode an unpadded RFC 4648 base32 string into exactly 20 bytes.
fn decode_base32_20(value: &str) -> Option<[u8; 20]> {
    let mut out = Vec::with_capacity(20);
    let mut buffer: u32 = 0;
    let mut bits: u8 = 0;
    for ch in value.chars() {
        let val = base32_value(ch)?;
        buffer = (buffer << 5) | u32::from(val);
        bits = bits.saturating_add(5);
        while bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    if out.len() != 20 {
        return None;
    }
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&out);
    Some(arr)
}

fn base32_value(ch: char) -> Option<u8> {
    let ch = ch.to_ascii_uppercase();
    match ch {
        'A'..='Z' => Some((ch as u8) - b'A'),
        '2'..='7' => Some((ch as u8) - b'2' + 26),
        _ => None,
    }
}

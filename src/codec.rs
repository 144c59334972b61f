//! Optional text encoding between a save's JSON and the stored string.
//!
//! With both options off the stored text is the record's JSON. Otherwise the
//! JSON bytes are LZ4-compressed (size-prefixed block), XORed with a fixed
//! key, or both, and the result is stored as standard base64.
//!
//! Decoding accepts plain JSON whatever the options say. Base64 never starts
//! with `{`, so a save written before compression was switched on (or a
//! hand-edited one) still loads.
//!
//! The XOR step is obfuscation against casual edits in the browser's
//! devtools, not encryption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;

use crate::app_response::AppResponse;
use crate::config::SaveConfig;

pub const OBFUSCATION_KEY: u8 = 42;

/// Largest decoded record accepted. Guards the allocation made from the
/// size prefix of a compressed block.
pub const MAX_DECODED_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec {
    pub compress: bool,
    pub obfuscate: bool,
}

impl TextCodec {
    pub fn new(compress: bool, obfuscate: bool) -> Self {
        Self { compress, obfuscate }
    }

    pub fn from_config(config: &SaveConfig) -> Self {
        Self::new(config.compress, config.obfuscate)
    }

    pub fn is_plain(&self) -> bool {
        !self.compress && !self.obfuscate
    }

    pub fn encode(&self, json: &str) -> String {
        if self.is_plain() {
            return json.to_string();
        }

        let mut bytes = json.as_bytes().to_vec();
        if self.compress {
            bytes = lz4_flex::compress_prepend_size(&bytes);
        }
        if self.obfuscate {
            xor_in_place(&mut bytes);
        }
        let encoded = STANDARD.encode(&bytes);
        debug!("Encoded save: {} -> {} bytes", json.len(), encoded.len());
        encoded
    }

    pub fn decode(&self, stored: &str) -> Result<String, AppResponse> {
        let trimmed = stored.trim_start();
        if self.is_plain() || trimmed.starts_with('{') {
            return Ok(stored.to_string());
        }

        let mut bytes = STANDARD
            .decode(trimmed.trim_end())
            .map_err(|e| AppResponse::SerializationError(format!("save is not valid base64: {e}")))?;
        if self.obfuscate {
            xor_in_place(&mut bytes);
        }
        if self.compress {
            bytes = decompress(&bytes)?;
        }
        String::from_utf8(bytes)
            .map_err(|_| AppResponse::SerializationError("decoded save is not valid UTF-8".to_string()))
    }
}

fn xor_in_place(bytes: &mut [u8]) {
    bytes.iter_mut().for_each(|b| *b ^= OBFUSCATION_KEY);
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, AppResponse> {
    let Some(prefix) = bytes.get(..4) else {
        return Err(AppResponse::SerializationError(
            "compressed save is truncated".to_string(),
        ));
    };
    let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if declared > MAX_DECODED_LEN {
        return Err(AppResponse::SerializationError(format!(
            "compressed save declares {declared} bytes, limit is {MAX_DECODED_LEN}"
        )));
    }
    lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| AppResponse::SerializationError(format!("save does not decompress: {e}")))
}

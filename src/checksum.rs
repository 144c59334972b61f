use serde_json::{Map, Value};

use crate::save_record::{statistics_object, Statistics};

/// Integrity digest over a save's payload and statistics.
///
/// The input is the compact JSON of `payload` followed by the compact JSON
/// of `statistics`, keys in insertion order and integral counters written as
/// integers. The digest is a 32-bit rolling hash (`h = h * 31 + unit`,
/// wrapping) over UTF-16 code units, printed as signed lowercase hex. This is
/// a corruption tripwire, not a cryptographic guarantee.
///
/// For records written by a JavaScript `JSON.stringify` producer the text is
/// the same, so their digests match, with one exception: non-integral
/// numbers of very large or very small magnitude switch to exponent notation
/// at different points and are spelled differently (`1e21` here, `1e+21`
/// there), so records holding them do not verify.
pub fn compute_checksum(payload: &Map<String, Value>, statistics: &Statistics) -> String {
    checksum_of(payload, &statistics_object(statistics))
}

/// [`compute_checksum`] over statistics exactly as they were parsed, so the
/// stored key order and number spelling are what gets hashed.
pub fn checksum_of(payload: &Map<String, Value>, statistics: &Map<String, Value>) -> String {
    // Serializing string-keyed maps of JSON values cannot fail.
    let mut canonical = serde_json::to_string(payload).unwrap_or_default();
    canonical.push_str(&serde_json::to_string(statistics).unwrap_or_default());
    hash_text(&canonical)
}

pub fn hash_text(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)));

    if hash < 0 {
        format!("-{:x}", hash.unsigned_abs())
    } else {
        format!("{:x}", hash)
    }
}

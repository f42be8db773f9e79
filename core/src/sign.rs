//! Per-call signature generation.

use crate::hash::hex_hmac_sha1;
use crate::request::Method;
use crate::Credential;

/// Derive the signature for one call attempt.
///
/// ## Format
///
/// ```text
/// "A" + public_key + hex(HMAC-SHA1(private_key, METHOD + "\n" + timestamp + "\n" + resource + "\n"))
/// ```
///
/// The timestamp is seconds since the unix epoch, captured once per call
/// attempt by the dispatcher. The result is only valid for that timestamp
/// window and must never be cached or reused; embedding it in a cache key
/// would make every lookup miss.
pub fn signature(cred: &Credential, method: Method, resource: &str, timestamp: i64) -> String {
    let string_to_sign = format!("{}\n{}\n{}\n", method.as_str(), timestamp, resource);
    format!(
        "A{}{}",
        cred.public_key,
        hex_hmac_sha1(cred.private_key.as_bytes(), string_to_sign.as_bytes())
    )
}

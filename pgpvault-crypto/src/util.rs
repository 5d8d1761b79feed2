//! Small helpers shared across the crate.

use crate::error::{CryptoError, CryptoResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub(crate) fn to_base64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

pub(crate) fn from_base64(encoded: &str) -> CryptoResult<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| CryptoError::DecryptionFailed(format!("invalid base64: {e}")))
}

pub(crate) fn is_base64(value: &str) -> bool {
    !value.is_empty() && BASE64.decode(value).is_ok()
}

/// Constant-time string equality. Length is not hidden (unequal lengths
/// return early); only the content comparison is constant-time.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Best-effort secret erasure. Rust moves and reallocations can leave stale
/// copies this cannot reach; callers should prefer `Zeroizing` wrappers so
/// buffers are also wiped on drop.
pub fn wipe(buf: &mut [u8]) {
    buf.zeroize();
}

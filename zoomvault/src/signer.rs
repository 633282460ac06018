//! HMAC signing of tile request paths.
//!
//! The tile service authenticates each request by a signature embedded in the
//! path itself:
//!
//! ```text
//! unsigned: {path}=x{x}-y{y}-z{z}-t{token}
//! signed:   {path}=x{x}-y{y}-z{z}-t{signature}
//! ```
//!
//! `signature` is the HMAC-SHA1 of the unsigned string, base64-encoded, with
//! both `+` and `/` replaced by `_` and trailing `=` removed. This is not the
//! base64url alphabet; the service rejects anything else.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Signing key embedded in the third-party tile client.
pub const DEFAULT_HMAC_KEY: [u8; 8] = [123, 43, 78, 35, 222, 44, 197, 197];

/// Computes signed tile paths.
///
/// Holds a keyed MAC that is cloned per call, so signing is pure and
/// infallible once the signer is built.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha1,
}

impl UrlSigner {
    /// Creates a signer for the given key.
    ///
    /// Returns `None` only for key material HMAC cannot accept, which does
    /// not happen for any non-empty key.
    pub fn new(key: &[u8]) -> Option<Self> {
        HmacSha1::new_from_slice(key)
            .ok()
            .map(|mac| Self { mac })
    }

    /// Builds the signed request path for one tile.
    ///
    /// # Example
    ///
    /// ```
    /// use zoomvault::signer::UrlSigner;
    ///
    /// let signer = UrlSigner::default();
    /// let path = signer.compute_signed_path("/ci/AbCdEf", "tok123", 2, 3, 4);
    /// assert_eq!(path, "/ci/AbCdEf=x2-y3-z4-tUqSZxXnk9CNG63REV6keY1JA95M");
    /// ```
    pub fn compute_signed_path(&self, path: &str, token: &str, x: u32, y: u32, z: u32) -> String {
        let unsigned = format!("{}=x{}-y{}-z{}-t{}", path, x, y, z, token);

        let mut mac = self.mac.clone();
        mac.update(unsigned.as_bytes());
        let digest = mac.finalize().into_bytes();

        let signature = STANDARD
            .encode(digest)
            .replace(|c: char| c == '+' || c == '/', "_");
        let signature = signature.trim_end_matches('=');

        format!("{}=x{}-y{}-z{}-t{}", path, x, y, z, signature)
    }
}

impl Default for UrlSigner {
    fn default() -> Self {
        Self {
            mac: HmacSha1::new_from_slice(&DEFAULT_HMAC_KEY)
                .expect("HMAC accepts keys of any length"),
        }
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}

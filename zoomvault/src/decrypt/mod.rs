//! Tile payload decryption.
//!
//! A tile body is either a plain image or an encrypted container (see
//! [`container`]). [`TileDecryptor::decrypt`] tells the two apart by the
//! leading marker and returns the plain image bytes in both cases.
//!
//! # Example
//!
//! ```
//! use zoomvault::decrypt::TileDecryptor;
//!
//! let decryptor = TileDecryptor::default();
//! let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
//! assert_eq!(decryptor.decrypt(jpeg.clone()).unwrap(), jpeg);
//! ```

mod cipher;
pub mod container;

pub use cipher::{TileCipher, PAD_LEN};

use tracing::trace;

use crate::config::CryptoConfig;
use crate::error::FormatError;

/// Big-endian value of the first four bytes of an encrypted container.
pub const CONTAINER_MARKER: u32 = 0x0A0A_0A0A;

/// AES-128 key embedded in the third-party tile client.
pub const DEFAULT_AES_KEY: [u8; 16] = [
    91, 99, 219, 19, 46, 220, 135, 129, 238, 230, 239, 212, 57, 110, 38, 170,
];

/// CBC initialisation vector embedded in the third-party tile client.
pub const DEFAULT_AES_IV: [u8; 16] = [
    113, 231, 4, 5, 38, 2, 32, 16, 31, 66, 4, 197, 11, 98, 103, 10,
];

/// Decodes tile containers and decrypts their encrypted section.
#[derive(Clone, Debug)]
pub struct TileDecryptor {
    marker: u32,
    cipher: TileCipher,
}

impl TileDecryptor {
    /// Creates a decryptor with explicit constants.
    pub fn new(marker: u32, key: [u8; 16], iv: [u8; 16]) -> Self {
        Self {
            marker,
            cipher: TileCipher::new(key, iv),
        }
    }

    /// Creates a decryptor from the `[crypto]` configuration.
    pub fn from_config(config: &CryptoConfig) -> Self {
        Self::new(config.container_marker, config.aes_key, config.aes_iv)
    }

    /// Returns the plain tile bytes.
    ///
    /// Buffers that do not start with the container marker are returned
    /// unchanged. Containers yield `clear prefix ++ decrypted ++ clear
    /// suffix`.
    ///
    /// # Errors
    ///
    /// [`FormatError::OffsetOutOfBounds`] when the container offsets point
    /// past the buffer, [`FormatError::Cipher`] when the encrypted section is
    /// not block-aligned.
    pub fn decrypt(&self, buffer: Vec<u8>) -> Result<Vec<u8>, FormatError> {
        if container::read_marker(&buffer) != Some(self.marker) {
            return Ok(buffer);
        }

        let parts = container::split(&buffer)?;
        let decrypted = self.cipher.decrypt(parts.encrypted)?;

        trace!(
            prefix = parts.clear_prefix.len(),
            encrypted = parts.encrypted.len(),
            suffix = parts.clear_suffix.len(),
            "Decrypted tile container"
        );

        let mut plain = Vec::with_capacity(
            parts.clear_prefix.len() + decrypted.len() + parts.clear_suffix.len(),
        );
        plain.extend_from_slice(parts.clear_prefix);
        plain.extend_from_slice(&decrypted);
        plain.extend_from_slice(parts.clear_suffix);
        Ok(plain)
    }

    /// Whether the buffer carries the container marker.
    pub fn is_container(&self, buffer: &[u8]) -> bool {
        container::read_marker(buffer) == Some(self.marker)
    }
}

impl Default for TileDecryptor {
    fn default() -> Self {
        Self::new(CONTAINER_MARKER, DEFAULT_AES_KEY, DEFAULT_AES_IV)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Builds a container around `secret` the way the tile service does.
    fn seal(decryptor: &TileDecryptor, prefix: &[u8], secret: &[u8], suffix: &[u8]) -> Vec<u8> {
        let encrypted = decryptor.cipher.encrypt(secret);
        container::assemble(decryptor.marker, prefix, &encrypted, suffix)
    }

    #[test]
    fn test_round_trip_fixture() {
        let decryptor = TileDecryptor::default();
        let prefix = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let secret: Vec<u8> = (0u8..64).map(|b| b.wrapping_mul(7)).collect();
        let suffix = [0xAB; 37];

        let container = seal(&decryptor, &prefix, &secret, &suffix);
        let plain = decryptor.decrypt(container).unwrap();

        let mut expected = prefix.to_vec();
        expected.extend_from_slice(&secret);
        expected.extend_from_slice(&suffix);
        assert_eq!(plain, expected);
    }

    #[test]
    fn test_output_length_formula() {
        let decryptor = TileDecryptor::default();
        let container = seal(&decryptor, b"abc", &[0u8; 32], b"de");
        let plain = decryptor.decrypt(container).unwrap();
        // prefix + (encrypted + PAD - PAD_LEN) + suffix
        assert_eq!(plain.len(), 3 + (32 + PAD_LEN - PAD_LEN) + 2);
    }

    #[test]
    fn test_short_buffers_pass_through() {
        let decryptor = TileDecryptor::default();
        assert_eq!(decryptor.decrypt(vec![]).unwrap(), Vec::<u8>::new());
        assert_eq!(decryptor.decrypt(vec![0x0A, 0x0A]).unwrap(), vec![0x0A, 0x0A]);
    }

    #[test]
    fn test_marker_only_is_format_error() {
        let decryptor = TileDecryptor::default();
        let err = decryptor.decrypt(vec![0x0A, 0x0A, 0x0A, 0x0A]).unwrap_err();
        assert!(matches!(err, FormatError::OffsetOutOfBounds { .. }));
    }

    #[test]
    fn test_corrupt_index_is_format_error() {
        let decryptor = TileDecryptor::default();
        let mut container = seal(&decryptor, b"prefix", &[1u8; 16], b"");
        let len = container.len();
        container[len - 4..].copy_from_slice(&500u32.to_le_bytes());

        assert!(matches!(
            decryptor.decrypt(container),
            Err(FormatError::OffsetOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_custom_marker() {
        let decryptor = TileDecryptor::new(0xCAFE_BABE, DEFAULT_AES_KEY, DEFAULT_AES_IV);
        let container = seal(&decryptor, b"", &[9u8; 16], b"");
        assert!(decryptor.is_container(&container));
        assert!(!TileDecryptor::default().is_container(&container));
        assert_eq!(decryptor.decrypt(container).unwrap(), vec![9u8; 16]);
    }

    proptest! {
        #[test]
        fn prop_identity_without_marker(buffer in proptest::collection::vec(any::<u8>(), 4..512)) {
            prop_assume!(buffer[..4] != CONTAINER_MARKER.to_be_bytes());
            let decryptor = TileDecryptor::default();
            prop_assert_eq!(decryptor.decrypt(buffer.clone()).unwrap(), buffer);
        }

        #[test]
        fn prop_round_trip(
            prefix in proptest::collection::vec(any::<u8>(), 0..64),
            blocks in 0usize..8,
            fill in any::<u8>(),
            suffix in proptest::collection::vec(any::<u8>(), 0..64),
        ) {
            let decryptor = TileDecryptor::default();
            let secret = vec![fill; blocks * 16];
            let container = seal(&decryptor, &prefix, &secret, &suffix);

            let plain = decryptor.decrypt(container).unwrap();
            let mut expected = prefix.clone();
            expected.extend_from_slice(&secret);
            expected.extend_from_slice(&suffix);
            prop_assert_eq!(plain, expected);
        }
    }
}

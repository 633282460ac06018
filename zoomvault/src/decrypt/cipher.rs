//! AES-128-CBC with the tile service's fixed tail block.
//!
//! The encrypted section is block-aligned, but the upstream client decrypts
//! it through an API that insists on padded input. It appends `PAD`, the
//! CBC encryption of thirty-two `0x10` bytes under the same key and IV, and
//! throws the last 32 bytes of output away. The result equals a raw CBC
//! decryption of the section; this module reproduces the exact steps so
//! both sides agree byte for byte.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::FormatError;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Length of the tail block appended before decryption.
pub const PAD_LEN: usize = 32;

/// Value of every byte in the plaintext that produces `PAD`.
const PAD_FILL: u8 = 16;

/// Fixed key and IV with the precomputed tail block.
#[derive(Clone)]
pub struct TileCipher {
    key: [u8; 16],
    iv: [u8; 16],
    pad: [u8; PAD_LEN],
}

impl TileCipher {
    /// Builds the cipher and computes `PAD` once.
    pub fn new(key: [u8; 16], iv: [u8; 16]) -> Self {
        let encrypted = Aes128CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(&[PAD_FILL; PAD_LEN]);
        let mut pad = [0u8; PAD_LEN];
        pad.copy_from_slice(&encrypted);
        Self { key, iv, pad }
    }

    /// The precomputed tail block.
    pub fn pad(&self) -> &[u8; PAD_LEN] {
        &self.pad
    }

    /// Decrypts an encrypted section.
    ///
    /// Decrypts `encrypted ++ PAD` and drops the final [`PAD_LEN`] bytes.
    /// A section that is not a multiple of the AES block size is a format
    /// error.
    pub fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, FormatError> {
        let mut input = Vec::with_capacity(encrypted.len() + PAD_LEN);
        input.extend_from_slice(encrypted);
        input.extend_from_slice(&self.pad);

        let mut output = Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<NoPadding>(&input)
            .map_err(|_| {
                FormatError::Cipher(format!(
                    "encrypted section of {} bytes is not block-aligned",
                    encrypted.len()
                ))
            })?;

        output.truncate(output.len() - PAD_LEN);
        Ok(output)
    }

    /// Encrypts block-aligned plaintext under the same key and IV.
    #[cfg(test)]
    pub(crate) fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<NoPadding>(plaintext)
    }
}

impl std::fmt::Debug for TileCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCipher").finish_non_exhaustive()
    }
}

//! Pluggable hash interface and HMAC built on top of it.
//!
//! The signer never names a concrete hash. It drives a [`HashFunction`]
//! through `init` / `update` / `finalize` and derives HMAC from the declared
//! block and digest lengths (RFC 2104), so a hardware engine or an external
//! library can be plugged in. [`Sha256Hash`] and [`Sha512Hash`] adapt the
//! `sha2` crate.

use std::fmt;

use digest::Digest;
use sha2::{Sha256, Sha512};

use crate::config::{HASH_MAX_BLOCK_LENGTH, HASH_MAX_DIGEST_LENGTH};
use crate::error::{HashError, SigV4Error, SigV4Result};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// An incremental hash primitive.
///
/// `init` starts a new computation, `update` feeds data, and `finalize` writes
/// the digest into the first [`digest_len`](HashFunction::digest_len) bytes of
/// its output. The signer calls `init` before every computation, so an
/// implementation may be reused across calls.
pub trait HashFunction {
    /// Block length of the hash in bytes (64 for SHA-256).
    fn block_len(&self) -> usize;

    /// Digest length of the hash in bytes (32 for SHA-256).
    fn digest_len(&self) -> usize;

    /// Reset the state for a new computation.
    fn init(&mut self) -> Result<(), HashError>;

    /// Feed `input` into the running computation.
    fn update(&mut self, input: &[u8]) -> Result<(), HashError>;

    /// Finish the computation, writing the digest to the front of `output`.
    fn finalize(&mut self, output: &mut [u8]) -> Result<(), HashError>;
}

macro_rules! sha2_hash {
    ($name:ident, $inner:ty, $label:literal, $block:literal, $digest:literal) => {
        #[doc = concat!("[`HashFunction`] adapter for ", $label, ".")]
        #[derive(Clone, Default)]
        pub struct $name {
            inner: $inner,
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }

        impl HashFunction for $name {
            fn block_len(&self) -> usize {
                $block
            }

            fn digest_len(&self) -> usize {
                $digest
            }

            fn init(&mut self) -> Result<(), HashError> {
                Digest::reset(&mut self.inner);
                Ok(())
            }

            fn update(&mut self, input: &[u8]) -> Result<(), HashError> {
                Digest::update(&mut self.inner, input);
                Ok(())
            }

            fn finalize(&mut self, output: &mut [u8]) -> Result<(), HashError> {
                let out = output.get_mut(..$digest).ok_or(HashError)?;
                out.copy_from_slice(&self.inner.finalize_reset());
                Ok(())
            }
        }
    };
}

sha2_hash!(Sha256Hash, Sha256, "SHA-256", 64, 32);
sha2_hash!(Sha512Hash, Sha512, "SHA-512", 128, 64);

/// Hash `data` into the front of `output`.
pub(crate) fn digest<H>(hash: &mut H, data: &[u8], output: &mut [u8]) -> SigV4Result<()>
where
    H: HashFunction + ?Sized,
{
    hash.init()?;
    hash.update(data)?;
    hash.finalize(output)?;
    Ok(())
}

/// Compute `HMAC(key, data)` with the injected hash, writing the MAC to the
/// front of `output`.
///
/// Keys longer than the block length are hashed first. The caller must have
/// checked the hash's declared lengths against the configured maxima.
pub(crate) fn hmac<H>(
    hash: &mut H,
    key: &[u8],
    data: &[u8],
    output: &mut [u8],
) -> SigV4Result<()>
where
    H: HashFunction + ?Sized,
{
    let block_len = hash.block_len();
    let digest_len = hash.digest_len();
    if block_len > HASH_MAX_BLOCK_LENGTH || digest_len > HASH_MAX_DIGEST_LENGTH {
        return Err(SigV4Error::InvalidParameter(
            "hash block or digest length exceeds the configured maximum",
        ));
    }

    let mut key_block = [0u8; HASH_MAX_BLOCK_LENGTH];
    if key.len() > block_len {
        digest(hash, key, &mut key_block[..digest_len])?;
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut pad = [0u8; HASH_MAX_BLOCK_LENGTH];
    xor_into(&mut pad[..block_len], &key_block[..block_len], IPAD);
    let mut inner = [0u8; HASH_MAX_DIGEST_LENGTH];
    hash.init()?;
    hash.update(&pad[..block_len])?;
    hash.update(data)?;
    hash.finalize(&mut inner[..digest_len])?;

    xor_into(&mut pad[..block_len], &key_block[..block_len], OPAD);
    hash.init()?;
    hash.update(&pad[..block_len])?;
    hash.update(&inner[..digest_len])?;
    hash.finalize(output)?;
    Ok(())
}

fn xor_into(out: &mut [u8], key: &[u8], pad: u8) {
    for (o, k) in out.iter_mut().zip(key) {
        *o = k ^ pad;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use hmac::{Hmac, KeyInit, Mac};

    use super::*;

    /// A hash whose `update` fails after a fixed number of successful calls.
    #[derive(Debug, Default)]
    pub(crate) struct FailingHash {
        inner: Sha256Hash,
        pub(crate) updates_before_failure: usize,
    }

    impl FailingHash {
        pub(crate) fn after(updates: usize) -> Self {
            Self {
                inner: Sha256Hash::default(),
                updates_before_failure: updates,
            }
        }
    }

    impl HashFunction for FailingHash {
        fn block_len(&self) -> usize {
            64
        }

        fn digest_len(&self) -> usize {
            32
        }

        fn init(&mut self) -> Result<(), HashError> {
            self.inner.init()
        }

        fn update(&mut self, input: &[u8]) -> Result<(), HashError> {
            if self.updates_before_failure == 0 {
                return Err(HashError);
            }
            self.updates_before_failure -= 1;
            self.inner.update(input)
        }

        fn finalize(&mut self, output: &mut [u8]) -> Result<(), HashError> {
            self.inner.finalize(output)
        }
    }

    fn reference_hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(key).expect("HMAC can accept keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    fn reference_hmac_sha512(key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut mac =
            Hmac::<Sha512>::new_from_slice(key).expect("HMAC can accept keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    #[test]
    fn test_should_hash_empty_payload_with_sha256() {
        let mut hash = Sha256Hash::default();
        let mut out = [0u8; 32];
        digest(&mut hash, b"", &mut out).unwrap();
        assert_eq!(
            hex::encode(out),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_should_reset_between_computations() {
        let mut hash = Sha256Hash::default();
        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        hash.update(b"leftover").unwrap();
        digest(&mut hash, b"abc", &mut first).unwrap();
        digest(&mut hash, b"abc", &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            hex::encode(first),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_should_reject_short_finalize_buffer() {
        let mut hash = Sha256Hash::default();
        let mut out = [0u8; 16];
        assert_eq!(hash.finalize(&mut out), Err(HashError));
    }

    #[test]
    fn test_should_match_reference_hmac_sha256() {
        let long_key = [0x0bu8; 131];
        for key in [&b"key"[..], &b""[..], &[0xaau8; 64][..], &long_key[..]] {
            let mut hash = Sha256Hash::default();
            let mut out = [0u8; 32];
            hmac(&mut hash, key, b"The quick brown fox", &mut out).unwrap();
            assert_eq!(
                out.to_vec(),
                reference_hmac_sha256(key, b"The quick brown fox")
            );
        }
    }

    #[test]
    fn test_should_match_reference_hmac_sha512() {
        let long_key = [0x42u8; 200];
        for key in [&b"AWS4secret"[..], &long_key[..]] {
            let mut hash = Sha512Hash::default();
            let mut out = [0u8; 64];
            hmac(&mut hash, key, b"20150830", &mut out).unwrap();
            assert_eq!(out.to_vec(), reference_hmac_sha512(key, b"20150830"));
        }
    }

    #[test]
    fn test_should_propagate_hash_failure() {
        let mut hash = FailingHash::after(1);
        let mut out = [0u8; 32];
        let result = hmac(&mut hash, b"key", b"data", &mut out);
        assert_eq!(result, Err(SigV4Error::Hash(HashError)));
    }
}

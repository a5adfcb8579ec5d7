// Copyright 2025 - Shroud Network <dev@shroud.network>
// SPDX-License-Identifier: Apache-2.0

//! The node's RSA key object: a shared handle over a public key or a full
//! keypair.
//!
//! Cloning the handle shares the underlying key; [`PublicKey::copy_full`]
//! makes an independent copy. The private material is zeroized when the
//! last handle drops. Operations that need the private half fail with
//! [`KeyError::NotPrivate`] on a public-only handle.

use std::cmp::Ordering;
use std::sync::Arc;

use rsa::pkcs1::{
    DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding,
};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::digest;
use crate::encoding::base16::base16_encode;
use crate::random::{self, RandomError};
use crate::{DIGEST_LEN, FINGERPRINT_LEN, PK_BYTES};

/// Public exponent used for generated keys.
const PUBLIC_EXPONENT: u32 = 65537;

/// Minimum run of `FF` bytes in a v1.5 type-01 padding block.
const MIN_PAD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("operation requires the private part of the key")]
    NotPrivate,

    #[error("input of {len} bytes does not fit a {keysize}-byte key with {overhead} bytes of padding overhead")]
    InputTooLong {
        len: usize,
        keysize: usize,
        overhead: usize,
    },

    #[error("operations without padding take exactly {expected} bytes, got {len}")]
    InvalidInputLength { len: usize, expected: usize },

    #[error("value does not fit below the key modulus")]
    InputTooLarge,

    #[error("invalid signature")]
    InvalidSignature,

    #[error(transparent)]
    Rsa(#[from] rsa::Error),

    #[error(transparent)]
    Pkcs1(#[from] rsa::pkcs1::Error),

    #[error(transparent)]
    Random(#[from] RandomError),
}

/// Padding schemes for the public-key encryption operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    No,
    Pkcs1,
    Pkcs1Oaep,
}

impl Padding {
    /// Plaintext bytes the scheme reserves for itself.
    pub fn overhead(self) -> usize {
        match self {
            Padding::No => 0,
            Padding::Pkcs1 => 11,
            Padding::Pkcs1Oaep => 42,
        }
    }
}

enum KeyInner {
    /// Only the public half is present.
    Public(RsaPublicKey),
    /// The full keypair.
    Private(RsaPrivateKey),
}

impl Clone for KeyInner {
    fn clone(&self) -> Self {
        match self {
            KeyInner::Public(k) => KeyInner::Public(k.clone()),
            KeyInner::Private(k) => KeyInner::Private(k.clone()),
        }
    }
}

/// A shared RSA public key or public/private keypair.
#[derive(Clone)]
pub struct PublicKey {
    inner: Arc<KeyInner>,
}

impl PublicKey {
    fn from_public(key: RsaPublicKey) -> Self {
        PublicKey {
            inner: Arc::new(KeyInner::Public(key)),
        }
    }

    fn from_private(key: RsaPrivateKey) -> Self {
        PublicKey {
            inner: Arc::new(KeyInner::Private(key)),
        }
    }

    /// Generate a fresh keypair: `PK_BYTES * 8` bits, e = 65537.
    pub fn generate() -> Result<Self, KeyError> {
        let key = random::with_rng(|rng| {
            RsaPrivateKey::new_with_exp(rng, PK_BYTES * 8, &BigUint::from(PUBLIC_EXPONENT))
        })?
        .map_err(|err| {
            warn!("crypto error while generating RSA key: {err}");
            KeyError::from(err)
        })?;
        Ok(Self::from_private(key))
    }

    /// True iff this handle carries the private-key portion.
    pub fn is_private(&self) -> bool {
        matches!(&*self.inner, KeyInner::Private(_))
    }

    /// An independent deep copy, keeping the public/full distinction.
    pub fn copy_full(&self) -> Self {
        PublicKey {
            inner: Arc::new((*self.inner).clone()),
        }
    }

    /// The size of the modulus, in bytes.
    pub fn keysize(&self) -> usize {
        match &*self.inner {
            KeyInner::Public(k) => k.size(),
            KeyInner::Private(k) => k.size(),
        }
    }

    fn parts(&self) -> (&BigUint, &BigUint) {
        match &*self.inner {
            KeyInner::Public(k) => (k.n(), k.e()),
            KeyInner::Private(k) => (k.n(), k.e()),
        }
    }

    fn public_rsa(&self) -> RsaPublicKey {
        match &*self.inner {
            KeyInner::Public(k) => k.clone(),
            KeyInner::Private(k) => k.to_public_key(),
        }
    }

    fn private_rsa(&self) -> Result<&RsaPrivateKey, KeyError> {
        match &*self.inner {
            KeyInner::Private(k) => Ok(k),
            KeyInner::Public(_) => Err(KeyError::NotPrivate),
        }
    }

    /// Run the full RSA sanity check (primes, congruences) on the key.
    pub fn check_key(&self) -> Result<(), KeyError> {
        self.private_rsa()?.validate().map_err(|err| {
            warn!("crypto error while checking RSA key: {err}");
            KeyError::from(err)
        })
    }

    /// Compare public moduli, then exponents.
    pub fn compare(&self, other: &Self) -> Ordering {
        let (n_a, e_a) = self.parts();
        let (n_b, e_b) = other.parts();
        n_a.cmp(n_b).then_with(|| e_a.cmp(e_b))
    }

    // -- PEM and DER forms ------------------------------------------------

    /// Parse a PEM-encoded (`BEGIN RSA PRIVATE KEY`) private key.
    pub fn from_private_pem(pem: &str) -> Result<Self, KeyError> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem).map_err(|err| {
            warn!("crypto error while parsing private key: {err}");
            KeyError::from(err)
        })?;
        Ok(Self::from_private(key))
    }

    /// PEM-encode the private key.
    pub fn to_private_pem(&self) -> Result<Zeroizing<String>, KeyError> {
        Ok(self.private_rsa()?.to_pkcs1_pem(LineEnding::LF)?)
    }

    /// Parse a PEM-encoded (`BEGIN RSA PUBLIC KEY`) public key.
    pub fn from_public_pem(pem: &str) -> Result<Self, KeyError> {
        let key = RsaPublicKey::from_pkcs1_pem(pem).map_err(|err| {
            warn!("crypto error while reading public key from string: {err}");
            KeyError::from(err)
        })?;
        Ok(Self::from_public(key))
    }

    /// PEM-encode the public key.
    pub fn to_public_pem(&self) -> Result<String, KeyError> {
        Ok(self.public_rsa().to_pkcs1_pem(LineEnding::LF)?)
    }

    /// Parse a DER-encoded PKCS#1 private key.
    pub fn from_private_der(der: &[u8]) -> Result<Self, KeyError> {
        let key = RsaPrivateKey::from_pkcs1_der(der).map_err(|err| {
            warn!("crypto error while parsing private key: {err}");
            KeyError::from(err)
        })?;
        Ok(Self::from_private(key))
    }

    /// DER-encode the private key.
    pub fn to_private_der(&self) -> Result<Zeroizing<Vec<u8>>, KeyError> {
        let doc = self.private_rsa()?.to_pkcs1_der()?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// DER-encode the public key:
    /// `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent INTEGER }`.
    pub fn asn1_encode(&self) -> Result<Vec<u8>, KeyError> {
        let doc = self.public_rsa().to_pkcs1_der().map_err(|err| {
            warn!("crypto error while encoding public key: {err}");
            KeyError::from(err)
        })?;
        Ok(doc.as_bytes().to_vec())
    }

    /// Parse a DER-encoded public key.
    pub fn asn1_decode(der: &[u8]) -> Result<Self, KeyError> {
        let key = RsaPublicKey::from_pkcs1_der(der).map_err(|err| {
            warn!("crypto error while decoding public key: {err}");
            KeyError::from(err)
        })?;
        Ok(Self::from_public(key))
    }

    // -- digests and fingerprints -----------------------------------------

    /// SHA-1 of the DER public-key encoding.
    pub fn to_digest(&self) -> Result<[u8; DIGEST_LEN], KeyError> {
        Ok(digest::digest(&self.asn1_encode()?))
    }

    /// The key's fingerprint: the digest in upper-case hex, with a space
    /// after every four digits when `add_space` is set.
    pub fn fingerprint(&self, add_space: bool) -> Result<String, KeyError> {
        let hex = base16_encode(&self.to_digest()?);
        if !add_space {
            return Ok(hex);
        }

        let mut out = String::with_capacity(FINGERPRINT_LEN);
        for (i, c) in hex.chars().enumerate() {
            if i > 0 && i % 4 == 0 {
                out.push(' ');
            }
            out.push(c);
        }
        Ok(out)
    }

    /// True iff `s` has exactly the shape of a spaced fingerprint.
    pub fn check_fingerprint_syntax(s: &str) -> bool {
        let bytes = s.as_bytes();
        if bytes.len() != FINGERPRINT_LEN {
            return false;
        }
        bytes.iter().enumerate().all(|(i, &c)| {
            if i % 5 == 4 {
                c.is_ascii_whitespace()
            } else {
                c.is_ascii_hexdigit()
            }
        })
    }

    // -- encryption -------------------------------------------------------

    /// Encrypt `from` under the public key with the given padding.
    ///
    /// Without padding the input must be exactly `keysize` bytes and
    /// numerically below the modulus.
    pub fn public_encrypt(&self, from: &[u8], padding: Padding) -> Result<Vec<u8>, KeyError> {
        let k = self.keysize();
        let result = match padding {
            Padding::No => self.raw_public_op(from),
            Padding::Pkcs1 => {
                self.check_plaintext_len(from.len(), padding)?;
                random::with_rng(|rng| self.public_rsa().encrypt(rng, Pkcs1v15Encrypt, from))?
                    .map_err(KeyError::from)
            }
            Padding::Pkcs1Oaep => {
                self.check_plaintext_len(from.len(), padding)?;
                random::with_rng(|rng| {
                    self.public_rsa().encrypt(rng, Oaep::new::<Sha1>(), from)
                })?
                .map_err(KeyError::from)
            }
        };
        result
            .map(|out| left_pad(out, k))
            .map_err(|err| {
                warn!("crypto error while performing RSA encryption: {err}");
                err
            })
    }

    /// Decrypt `from` with the private key and the given padding.
    ///
    /// `warn_on_failure` picks the log severity for a failed decryption;
    /// untrusted ciphertexts routinely fail and need not be loud about it.
    pub fn private_decrypt(
        &self,
        from: &[u8],
        padding: Padding,
        warn_on_failure: bool,
    ) -> Result<Vec<u8>, KeyError> {
        let key = self.private_rsa()?;
        let result = match padding {
            Padding::No => self.raw_private_op(from).map(|m| left_pad(m, self.keysize())),
            Padding::Pkcs1 => key.decrypt(Pkcs1v15Encrypt, from).map_err(KeyError::from),
            Padding::Pkcs1Oaep => key
                .decrypt(Oaep::new::<Sha1>(), from)
                .map_err(KeyError::from),
        };
        result.map_err(|err| {
            if warn_on_failure {
                warn!("crypto error while performing RSA decryption: {err}");
            } else {
                debug!("crypto error while performing RSA decryption: {err}");
            }
            err
        })
    }

    // -- textbook signatures ----------------------------------------------

    /// Sign `from` with the private key under PKCS#1 v1.5 padding, no
    /// digest prefix. `from` is signed as-is; see
    /// [`Self::private_sign_digest`] for the hashed form.
    pub fn private_sign(&self, from: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key = self.private_rsa()?;
        self.check_plaintext_len(from.len(), Padding::Pkcs1)?;
        key.sign(Pkcs1v15Sign::new_unprefixed(), from)
            .map(|out| left_pad(out, self.keysize()))
            .map_err(|err| {
                warn!("crypto error while generating RSA signature: {err}");
                KeyError::from(err)
            })
    }

    /// Recover the bytes signed by [`Self::private_sign`]: the raw public
    /// operation followed by removal of the v1.5 type-01 padding.
    pub fn public_checksig(&self, sig: &[u8]) -> Result<Vec<u8>, KeyError> {
        let em = self.raw_public_op(sig).map_err(|err| {
            warn!("crypto error while checking RSA signature: {err}");
            err
        })?;

        // EM = 00 || 01 || PS (>= 8 bytes of FF) || 00 || payload
        if em.len() < MIN_PAD_LEN + 3 || em[0] != 0x00 || em[1] != 0x01 {
            return Err(KeyError::InvalidSignature);
        }
        let mut idx = 2;
        while idx < em.len() && em[idx] == 0xff {
            idx += 1;
        }
        if idx - 2 < MIN_PAD_LEN || idx == em.len() || em[idx] != 0x00 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(em[idx + 1..].to_vec())
    }

    /// Sign the SHA-1 digest of `data`.
    pub fn private_sign_digest(&self, data: &[u8]) -> Result<Vec<u8>, KeyError> {
        let d = Zeroizing::new(digest::digest(data));
        self.private_sign(&*d)
    }

    /// Verify that `sig` is a signature over the SHA-1 digest of `data`.
    pub fn public_checksig_digest(&self, data: &[u8], sig: &[u8]) -> Result<(), KeyError> {
        let expected = digest::digest(data);
        let recovered = self.public_checksig(sig)?;
        if recovered.len() != DIGEST_LEN {
            warn!("Invalid signature");
            return Err(KeyError::InvalidSignature);
        }
        if recovered != expected {
            warn!("Signature mismatched with digest.");
            return Err(KeyError::InvalidSignature);
        }
        Ok(())
    }

    // -- raw operations ---------------------------------------------------

    fn check_plaintext_len(&self, len: usize, padding: Padding) -> Result<(), KeyError> {
        let k = self.keysize();
        let overhead = padding.overhead();
        if len + overhead > k {
            return Err(KeyError::InputTooLong {
                len,
                keysize: k,
                overhead,
            });
        }
        Ok(())
    }

    /// `m^e mod n` over exactly `keysize` input bytes.
    fn raw_public_op(&self, from: &[u8]) -> Result<Vec<u8>, KeyError> {
        let k = self.keysize();
        if from.len() != k {
            return Err(KeyError::InvalidInputLength {
                len: from.len(),
                expected: k,
            });
        }
        let (n, _) = self.parts();
        let m = BigUint::from_bytes_be(from);
        if &m >= n {
            return Err(KeyError::InputTooLarge);
        }

        let c = match &*self.inner {
            KeyInner::Public(key) => rsa::hazmat::rsa_encrypt(key, &m)?,
            KeyInner::Private(key) => rsa::hazmat::rsa_encrypt(key, &m)?,
        };
        Ok(left_pad(c.to_bytes_be(), k))
    }

    /// `c^d mod n` over exactly `keysize` input bytes, blinded.
    fn raw_private_op(&self, from: &[u8]) -> Result<Vec<u8>, KeyError> {
        let key = self.private_rsa()?;
        let k = self.keysize();
        if from.len() != k {
            return Err(KeyError::InvalidInputLength {
                len: from.len(),
                expected: k,
            });
        }
        let c = BigUint::from_bytes_be(from);
        if &c >= key.n() {
            return Err(KeyError::InputTooLarge);
        }

        let m = random::with_rng(|rng| rsa::hazmat::rsa_decrypt_and_check(key, Some(rng), &c))??;
        Ok(m.to_bytes_be())
    }
}

/// Order two optional keys; a missing or keyless operand sorts first, as
/// "different".
pub fn cmp_keys(a: Option<&PublicKey>, b: Option<&PublicKey>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b),
        _ => Ordering::Less,
    }
}

/// Left-pad `bytes` with zeros to exactly `len` bytes.
fn left_pad(bytes: Vec<u8>, len: usize) -> Vec<u8> {
    if bytes.len() >= len {
        return bytes;
    }
    let mut out = vec![0u8; len];
    let offset = len - bytes.len();
    out[offset..].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::seed_rng;
    use crate::{BASE64_DIGEST_LEN, HEX_DIGEST_LEN};

    fn test_key() -> PublicKey {
        seed_rng(true).unwrap();
        PublicKey::generate().unwrap()
    }

    #[test]
    fn generated_keys_have_the_advertised_size() {
        let key = test_key();
        assert_eq!(key.keysize(), PK_BYTES);
        assert!(key.is_private());
        key.check_key().unwrap();
    }

    #[test]
    fn clone_shares_and_copy_full_duplicates() {
        let key = test_key();
        let shared = key.clone();
        let copied = key.copy_full();

        assert_eq!(key.compare(&shared), Ordering::Equal);
        assert_eq!(key.compare(&copied), Ordering::Equal);
        assert!(copied.is_private());

        let public_only = PublicKey::asn1_decode(&key.asn1_encode().unwrap()).unwrap();
        assert!(!public_only.copy_full().is_private());
    }

    #[test]
    fn pem_private_round_trip_preserves_der() {
        let key = test_key();
        let pem = key.to_private_pem().unwrap();
        let parsed = PublicKey::from_private_pem(&pem).unwrap();
        assert_eq!(
            key.to_private_der().unwrap().to_vec(),
            parsed.to_private_der().unwrap().to_vec()
        );
    }

    #[test]
    fn pem_public_round_trip() {
        let key = test_key();
        let pem = key.to_public_pem().unwrap();
        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----"));
        let parsed = PublicKey::from_public_pem(&pem).unwrap();
        assert!(!parsed.is_private());
        assert_eq!(key.compare(&parsed), Ordering::Equal);
    }

    #[test]
    fn public_only_handles_refuse_private_operations() {
        let key = test_key();
        let public = PublicKey::asn1_decode(&key.asn1_encode().unwrap()).unwrap();

        assert!(matches!(
            public.to_private_pem(),
            Err(KeyError::NotPrivate)
        ));
        assert!(matches!(
            public.private_sign(b"data"),
            Err(KeyError::NotPrivate)
        ));
        assert!(matches!(
            public.private_decrypt(&vec![0u8; PK_BYTES], Padding::Pkcs1, false),
            Err(KeyError::NotPrivate)
        ));
    }

    #[test]
    fn asn1_round_trip_and_digest() {
        let key = test_key();
        let der = key.asn1_encode().unwrap();
        let decoded = PublicKey::asn1_decode(&der).unwrap();
        assert_eq!(key.compare(&decoded), Ordering::Equal);
        assert_eq!(key.to_digest().unwrap(), decoded.to_digest().unwrap());
    }

    #[test]
    fn compare_orders_keys_totally() {
        let a = test_key();
        let b = test_key();
        assert_eq!(a.compare(&b).reverse(), b.compare(&a));
        assert_eq!(a.compare(&a), Ordering::Equal);
        assert_eq!(cmp_keys(None, Some(&a)), Ordering::Less);
        assert_eq!(cmp_keys(Some(&a), None), Ordering::Less);
        assert_eq!(cmp_keys(None, None), Ordering::Less);
    }

    #[test]
    fn fingerprints() {
        let key = test_key();

        let plain = key.fingerprint(false).unwrap();
        assert_eq!(plain.len(), HEX_DIGEST_LEN);
        assert!(!PublicKey::check_fingerprint_syntax(&plain));

        let spaced = key.fingerprint(true).unwrap();
        assert_eq!(spaced.len(), FINGERPRINT_LEN);
        assert!(PublicKey::check_fingerprint_syntax(&spaced));
        assert_eq!(spaced.replace(' ', ""), plain);
        assert!(plain
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn fingerprint_syntax_rejects_malformed_strings() {
        assert!(!PublicKey::check_fingerprint_syntax(""));
        assert!(!PublicKey::check_fingerprint_syntax(&"A".repeat(49)));
        let good = format!("{} {} {} {} {} {} {} {} {} {}", "AB12", "34CD", "EF56", "0001", "BEEF", "CAFE", "1234", "5678", "9ABC", "DEF0");
        assert!(PublicKey::check_fingerprint_syntax(&good));
        assert!(!PublicKey::check_fingerprint_syntax(&format!("{good} ")));
    }

    #[test]
    fn encrypt_decrypt_all_paddings() {
        let key = test_key();
        let msg = b"layered ciphertexts all the way down";

        for padding in [Padding::Pkcs1, Padding::Pkcs1Oaep] {
            let ct = key.public_encrypt(msg, padding).unwrap();
            assert_eq!(ct.len(), key.keysize());
            let pt = key.private_decrypt(&ct, padding, true).unwrap();
            assert_eq!(pt, msg);
        }
    }

    #[test]
    fn no_padding_requires_exact_keysize() {
        let key = test_key();
        assert!(matches!(
            key.public_encrypt(b"short", Padding::No),
            Err(KeyError::InvalidInputLength { .. })
        ));

        let mut block = vec![0u8; PK_BYTES];
        block[0] = 0x01; // keep the value below the modulus
        block[PK_BYTES - 1] = 0x99;
        let ct = key.public_encrypt(&block, Padding::No).unwrap();
        assert_eq!(ct.len(), PK_BYTES);
        let pt = key.private_decrypt(&ct, Padding::No, true).unwrap();
        assert_eq!(pt, block);
    }

    #[test]
    fn oversized_plaintexts_are_rejected() {
        let key = test_key();
        let too_long = vec![0u8; PK_BYTES - 10];
        assert!(matches!(
            key.public_encrypt(&too_long, Padding::Pkcs1),
            Err(KeyError::InputTooLong { .. })
        ));
        assert!(matches!(
            key.public_encrypt(&vec![0u8; PK_BYTES - 41], Padding::Pkcs1Oaep),
            Err(KeyError::InputTooLong { .. })
        ));
    }

    #[test]
    fn sign_and_recover_arbitrary_bytes() {
        let key = test_key();
        let msg = b"a short signed statement";
        let sig = key.private_sign(msg).unwrap();
        assert_eq!(sig.len(), key.keysize());
        assert_eq!(key.public_checksig(&sig).unwrap(), msg);
    }

    #[test]
    fn digest_signatures_verify_and_tampering_fails() {
        let key = test_key();
        let msg = b"router descriptor contents";
        let sig = key.private_sign_digest(msg).unwrap();
        key.public_checksig_digest(msg, &sig).unwrap();

        // flip one bit of the message
        let mut tampered_msg = msg.to_vec();
        tampered_msg[3] ^= 0x04;
        assert!(matches!(
            key.public_checksig_digest(&tampered_msg, &sig),
            Err(KeyError::InvalidSignature) | Err(KeyError::Rsa(_))
        ));

        // flip one bit of the signature
        let mut tampered_sig = sig.clone();
        tampered_sig[10] ^= 0x80;
        assert!(key.public_checksig_digest(msg, &tampered_sig).is_err());
    }

    #[test]
    fn checksig_of_garbage_is_invalid() {
        let key = test_key();
        let garbage = vec![0x41u8; 16];
        assert!(key.public_checksig(&garbage).is_err());
    }

    #[test]
    fn digest_base64_short_form_has_expected_width() {
        let key = test_key();
        let d64 = crate::encoding::digest_to_base64(&key.to_digest().unwrap());
        assert_eq!(d64.len(), BASE64_DIGEST_LEN);
    }
}

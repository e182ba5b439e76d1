//!
//! Digest primitives: hash a byte sequence and extend a PCR value
//!
use openssl::hash::Hasher;
use tpm2::{Digest, HashAlgorithmId};

use crate::profile::ProfileError;

type Result<T> = core::result::Result<T, ProfileError>;

/// Return the digest size of `alg`, or an error if we cannot compute digests
/// with it
pub fn check_algorithm(alg: HashAlgorithmId) -> Result<usize> {
    match alg.size() {
        Some(size) if alg.is_supported() => Ok(size),
        _ => Err(ProfileError::UnsupportedAlgorithm(alg)),
    }
}

/// Return an error if `digest` doesn't have the size of an `alg` digest
pub fn check_digest(alg: HashAlgorithmId, digest: &[u8]) -> Result<()> {
    if check_algorithm(alg)? != digest.len() {
        return Err(ProfileError::DigestLengthMismatch {
            alg,
            len: digest.len(),
        });
    }
    Ok(())
}

/// Create a hasher for `alg`. Integers can be written into it with
/// `byteorder::WriteBytesExt`.
pub fn new_hasher(alg: HashAlgorithmId) -> Result<Hasher> {
    check_algorithm(alg)?;
    Ok(alg.new_hasher()?)
}

/// Hash `data` with `alg`
pub fn compute_digest(alg: HashAlgorithmId, data: &[u8]) -> Result<Digest> {
    check_algorithm(alg)?;
    Ok(alg.hash(data)?)
}

/// The reset value of a PCR in bank `alg`
pub fn zero_digest(alg: HashAlgorithmId) -> Result<Digest> {
    Ok(vec![0; check_algorithm(alg)?])
}

/// Return H(value || digest), the new value of a PCR holding `value` after
/// being extended with `digest`.
///
/// # Panics
///
/// Both inputs must have the size of an `alg` digest.
pub fn extend(alg: HashAlgorithmId, value: &[u8], digest: &[u8]) -> Result<Digest> {
    let size = check_algorithm(alg)?;
    assert_eq!(value.len(), size, "PCR value doesn't match {alg}");
    assert_eq!(digest.len(), size, "event digest doesn't match {alg}");

    let mut hasher = new_hasher(alg)?;
    hasher.update(value)?;
    hasher.update(digest)?;
    Ok(hasher.finish()?.to_vec())
}

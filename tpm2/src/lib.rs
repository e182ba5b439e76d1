//! Structures and values defined by the TPM 2.0 library specification
//!
//! This library provides the subset of TPM 2.0 definitions needed to predict
//! and perform PCR measurements: hash algorithm identifiers, PCR selections
//! and values, and the [Tpm] trait through which a device is driven. A
//! software PCR bank, [SoftTpm], implements the trait without any hardware.
#![warn(missing_docs)]
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use openssl::hash::{Hasher, MessageDigest};
use serde::{Deserialize, Serialize};

mod sim;
pub use sim::SoftTpm;

/// Number of PCRs implemented by a PC-client platform TPM
pub const PLATFORM_PCRS: u32 = 24;

/// A digest, the output of one of the hash algorithms
pub type Digest = Vec<u8>;

/// Error from the TPM library
#[derive(Debug, thiserror::Error)]
pub enum Tpm2Error {
    /// Unknown hash algorithm name or identifier
    #[error("unknown hash algorithm `{0}`")]
    UnknownHashAlgorithm(String),

    /// The algorithm is known, but we cannot compute digests with it
    #[error("unsupported hash algorithm {0}")]
    UnsupportedAlgorithm(HashAlgorithmId),

    /// PCR index outside of the implemented range
    #[error("invalid PCR index {0}")]
    InvalidPcrIndex(u32),

    /// Digest size doesn't match the algorithm
    #[error("invalid {alg} digest length {len}")]
    DigestLength {
        /// Algorithm of the PCR bank
        alg: HashAlgorithmId,
        /// Length of the provided digest
        len: usize,
    },

    /// Error from the crypto library
    #[error("crypto error")]
    Crypto(#[from] openssl::error::ErrorStack),

    /// Error returned by the TPM device or its transport
    #[error("TPM device error: {0}")]
    Device(#[source] Box<dyn std::error::Error + Send + Sync>),
}
type Result<T> = core::result::Result<T, Tpm2Error>;

/// A TPM_ALG_ID identifying a hash algorithm
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashAlgorithmId(pub u16);

impl HashAlgorithmId {
    /// The SHA-1 algorithm
    pub const SHA1: Self = Self(0x0004);
    /// The SHA-256 algorithm
    pub const SHA256: Self = Self(0x000b);
    /// The SHA-384 algorithm
    pub const SHA384: Self = Self(0x000c);
    /// The SHA-512 algorithm
    pub const SHA512: Self = Self(0x000d);
    /// The SM3-256 algorithm
    pub const SM3_256: Self = Self(0x0012);
    /// The SHA3-256 algorithm
    pub const SHA3_256: Self = Self(0x0027);
    /// The SHA3-384 algorithm
    pub const SHA3_384: Self = Self(0x0028);
    /// The SHA3-512 algorithm
    pub const SHA3_512: Self = Self(0x0029);

    const NAMES: [(Self, &'static str); 8] = [
        (Self::SHA1, "sha1"),
        (Self::SHA256, "sha256"),
        (Self::SHA384, "sha384"),
        (Self::SHA512, "sha512"),
        (Self::SM3_256, "sm3_256"),
        (Self::SHA3_256, "sha3_256"),
        (Self::SHA3_384, "sha3_384"),
        (Self::SHA3_512, "sha3_512"),
    ];

    /// Size of a digest in bytes, or None if the algorithm is unknown
    pub fn size(&self) -> Option<usize> {
        match *self {
            Self::SHA1 => Some(20),
            Self::SHA256 | Self::SM3_256 | Self::SHA3_256 => Some(32),
            Self::SHA384 | Self::SHA3_384 => Some(48),
            Self::SHA512 | Self::SHA3_512 => Some(64),
            _ => None,
        }
    }

    fn message_digest(&self) -> Option<MessageDigest> {
        match *self {
            Self::SHA1 => Some(MessageDigest::sha1()),
            Self::SHA256 => Some(MessageDigest::sha256()),
            Self::SHA384 => Some(MessageDigest::sha384()),
            Self::SHA512 => Some(MessageDigest::sha512()),
            _ => None,
        }
    }

    /// True if digests can be computed with this algorithm
    pub fn is_supported(&self) -> bool {
        self.message_digest().is_some()
    }

    /// Create a new hasher for this algorithm. The hasher implements
    /// [std::io::Write], so fixed-width integers can be written into it
    /// directly.
    pub fn new_hasher(&self) -> Result<Hasher> {
        let md = self
            .message_digest()
            .ok_or(Tpm2Error::UnsupportedAlgorithm(*self))?;
        Ok(Hasher::new(md)?)
    }

    /// Hash `data` in one go
    pub fn hash(&self, data: &[u8]) -> Result<Digest> {
        let md = self
            .message_digest()
            .ok_or(Tpm2Error::UnsupportedAlgorithm(*self))?;
        Ok(openssl::hash::hash(md, data)?.to_vec())
    }

    /// A digest of this algorithm's size filled with zeroes, the reset value
    /// of most PCRs
    pub fn zero_digest(&self) -> Result<Digest> {
        let size = self.size().ok_or(Tpm2Error::UnsupportedAlgorithm(*self))?;
        Ok(vec![0; size])
    }
}

impl fmt::Display for HashAlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::NAMES.iter().find(|(alg, _)| alg == self) {
            Some((_, name)) => write!(f, "{name}"),
            None => write!(f, "TPM_ALG_{:#06x}", self.0),
        }
    }
}

impl FromStr for HashAlgorithmId {
    type Err = Tpm2Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(alg, _)| *alg)
            .ok_or_else(|| Tpm2Error::UnknownHashAlgorithm(String::from(s)))
    }
}

impl TryFrom<u16> for HashAlgorithmId {
    type Error = Tpm2Error;
    fn try_from(id: u16) -> Result<Self> {
        let alg = Self(id);
        if alg.size().is_none() {
            return Err(Tpm2Error::UnknownHashAlgorithm(format!("{id:#06x}")));
        }
        Ok(alg)
    }
}

impl TryFrom<String> for HashAlgorithmId {
    type Error = Tpm2Error;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<HashAlgorithmId> for String {
    fn from(alg: HashAlgorithmId) -> String {
        alg.to_string()
    }
}

/// Return an error if `pcr` isn't implemented by the platform
pub fn check_pcr_index(pcr: u32) -> Result<u32> {
    if pcr >= PLATFORM_PCRS {
        return Err(Tpm2Error::InvalidPcrIndex(pcr));
    }
    Ok(pcr)
}

/// Selection of PCRs within one bank (TPMS_PCR_SELECTION)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcrSelection {
    /// Algorithm of the bank
    pub hash: HashAlgorithmId,
    /// Selected PCR indices, in ascending order
    pub select: BTreeSet<u32>,
}

impl PcrSelection {
    /// Select the given PCRs of bank `hash`
    pub fn new(hash: HashAlgorithmId, pcrs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            hash,
            select: pcrs.into_iter().collect(),
        }
    }
}

impl fmt::Display for PcrSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pcrs: Vec<String> = self.select.iter().map(|p| p.to_string()).collect();
        write!(f, "{}:{}", self.hash, pcrs.join(","))
    }
}

/// PCR values, indexed by bank then by PCR index. A missing entry means that
/// the PCR isn't part of the set, which is different from a zero value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PcrValues(BTreeMap<HashAlgorithmId, BTreeMap<u32, Digest>>);

impl PcrValues {
    /// Create an empty set of values
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the value of PCR `pcr` in bank `alg`, if it is part of the set
    pub fn get(&self, alg: HashAlgorithmId, pcr: u32) -> Option<&Digest> {
        self.0.get(&alg).and_then(|bank| bank.get(&pcr))
    }

    /// Set the value of PCR `pcr` in bank `alg`
    pub fn set(&mut self, alg: HashAlgorithmId, pcr: u32, value: Digest) {
        self.0.entry(alg).or_default().insert(pcr, value);
    }

    /// True if no PCR is part of the set
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|bank| bank.is_empty())
    }

    /// Iterate over (bank, PCR, value), sorted by algorithm ID then PCR index
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithmId, u32, &Digest)> {
        self.0
            .iter()
            .flat_map(|(alg, bank)| bank.iter().map(move |(pcr, v)| (*alg, *pcr, v)))
    }

    /// The selection of PCRs that have a value in this set
    pub fn selection(&self) -> Vec<PcrSelection> {
        self.0
            .iter()
            .filter(|(_, bank)| !bank.is_empty())
            .map(|(alg, bank)| PcrSelection::new(*alg, bank.keys().copied()))
            .collect()
    }
}

impl FromIterator<(HashAlgorithmId, u32, Digest)> for PcrValues {
    fn from_iter<I: IntoIterator<Item = (HashAlgorithmId, u32, Digest)>>(iter: I) -> Self {
        let mut values = Self::new();
        for (alg, pcr, value) in iter {
            values.set(alg, pcr, value);
        }
        values
    }
}

/// Commands a TPM device provides for measuring and reading PCRs.
///
/// Methods take `&mut self` because a device handle carries transport and
/// session state. Callers sharing a device must serialize access to it.
pub trait Tpm {
    /// Return the hash algorithms of the PCR banks that are allocated
    fn supported_banks(&mut self) -> Result<Vec<HashAlgorithmId>>;

    /// Read the selected PCRs
    fn pcr_read(&mut self, selection: &[PcrSelection]) -> Result<PcrValues>;

    /// Extend PCR `pcr` of bank `alg` with `digest`
    fn pcr_extend(&mut self, alg: HashAlgorithmId, pcr: u32, digest: &[u8]) -> Result<()>;
}

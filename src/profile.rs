//!
//! A PCR profile describes a measured boot sequence as a tree of instructions.
//! Instructions either set or extend one PCR, or branch into mutually
//! exclusive alternative sequences. Evaluating the profile yields every set of
//! PCR values the boot can produce.
//!
use std::fmt;

use tpm2::{Digest, HashAlgorithmId, Tpm2Error, PLATFORM_PCRS};

use crate::hash;
use crate::utils::buf_to_hex_str;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum ProfileError {
    #[error("unsupported hash algorithm {0}")]
    UnsupportedAlgorithm(HashAlgorithmId),

    #[error("invalid PCR index {0}")]
    InvalidPcrIndex(u32),

    #[error("no alternative was given for {0}")]
    EmptyAlternativeSet(&'static str),

    #[error("invalid {alg} digest length {len}")]
    DigestLengthMismatch { alg: HashAlgorithmId, len: usize },

    #[error("invalid sign key id: {0}")]
    InvalidSignKeyId(String),

    #[error("the profile reads PCR values from a TPM, but none was provided")]
    MissingTpm,

    #[error("no value for PCR{pcr},{alg}")]
    MissingPcrValue { alg: HashAlgorithmId, pcr: u32 },

    #[error("TPM")]
    Tpm(#[from] Tpm2Error),

    #[error("crypto error")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("file {filename} error: {e}")]
    File { e: std::io::Error, filename: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O")]
    IO(#[from] std::io::Error),
}
type Result<T> = core::result::Result<T, ProfileError>;

/// Check that PCR `pcr` of bank `alg` can be part of a profile, and return the
/// size of its digests.
pub fn check_pcr(alg: HashAlgorithmId, pcr: u32) -> Result<usize> {
    let size = hash::check_algorithm(alg)?;
    if pcr >= PLATFORM_PCRS {
        return Err(ProfileError::InvalidPcrIndex(pcr));
    }
    Ok(size)
}

/// One step of a [Profile]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Set the PCR to an absolute value
    AddPcrValue {
        /// PCR bank
        alg: HashAlgorithmId,
        /// PCR index
        pcr: u32,
        /// New value
        value: Digest,
    },
    /// Set the PCR to its current value on the TPM, read when the profile is
    /// evaluated
    AddPcrValueFromTpm {
        /// PCR bank
        alg: HashAlgorithmId,
        /// PCR index
        pcr: u32,
    },
    /// Extend the PCR with an event digest
    ExtendPcr {
        /// PCR bank
        alg: HashAlgorithmId,
        /// PCR index
        pcr: u32,
        /// Event digest
        digest: Digest,
    },
    /// Exactly one of the sub-profiles is applied. Never empty.
    AddProfileOr(Vec<Profile>),
}

/// A sequence of instructions predicting the PCR values of a measured boot.
///
/// Builder methods validate their arguments before appending anything, so a
/// failed call leaves the profile as it was. They return the profile so that
/// calls can be chained:
///
/// ```
/// use pcr_profile::{HashAlgorithmId, Profile};
///
/// let alg = HashAlgorithmId::SHA256;
/// let mut run = Profile::new();
/// run.extend_pcr(alg, 12, &[1; 32]).unwrap();
/// let mut recover = Profile::new();
/// recover.extend_pcr(alg, 12, &[2; 32]).unwrap();
///
/// let mut profile = Profile::new();
/// profile
///     .add_pcr_value(alg, 7, &[0xaa; 32])
///     .unwrap()
///     .add_profile_or([run, recover])
///     .unwrap();
/// assert_eq!(profile.path_count(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    instructions: Vec<Instruction>,
}

impl Profile {
    /// Create an empty profile
    pub fn new() -> Self {
        Self::default()
    }

    /// The instructions of this profile, in order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// True if the profile has no instruction
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Set PCR `pcr` of bank `alg` to `value`
    pub fn add_pcr_value(
        &mut self,
        alg: HashAlgorithmId,
        pcr: u32,
        value: &[u8],
    ) -> Result<&mut Self> {
        check_pcr(alg, pcr)?;
        hash::check_digest(alg, value)?;
        self.instructions.push(Instruction::AddPcrValue {
            alg,
            pcr,
            value: value.to_vec(),
        });
        Ok(self)
    }

    /// Set PCR `pcr` of bank `alg` to the value it has on the TPM at
    /// evaluation time
    pub fn add_pcr_value_from_tpm(&mut self, alg: HashAlgorithmId, pcr: u32) -> Result<&mut Self> {
        check_pcr(alg, pcr)?;
        self.instructions
            .push(Instruction::AddPcrValueFromTpm { alg, pcr });
        Ok(self)
    }

    /// Extend PCR `pcr` of bank `alg` with the event digest `digest`
    pub fn extend_pcr(
        &mut self,
        alg: HashAlgorithmId,
        pcr: u32,
        digest: &[u8],
    ) -> Result<&mut Self> {
        check_pcr(alg, pcr)?;
        hash::check_digest(alg, digest)?;
        self.instructions.push(Instruction::ExtendPcr {
            alg,
            pcr,
            digest: digest.to_vec(),
        });
        Ok(self)
    }

    /// Branch into alternative sub-profiles. Each one is applied to its own
    /// copy of the PCR values at this point, and the instructions that follow
    /// apply to all of them.
    pub fn add_profile_or(
        &mut self,
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Result<&mut Self> {
        let profiles: Vec<Profile> = profiles.into_iter().collect();
        if profiles.is_empty() {
            return Err(ProfileError::EmptyAlternativeSet("profile branch"));
        }
        self.instructions.push(Instruction::AddProfileOr(profiles));
        Ok(self)
    }

    /// Append all instructions of `other` to this profile
    pub fn append(&mut self, other: Profile) -> &mut Self {
        self.instructions.extend(other.instructions);
        self
    }

    /// Number of PCR value sets that evaluation produces: the product of the
    /// widths of all branches along a path. Saturates at usize::MAX.
    pub fn path_count(&self) -> usize {
        self.instructions.iter().fold(1, |count, instr| match instr {
            Instruction::AddProfileOr(alternatives) => {
                let width = alternatives
                    .iter()
                    .fold(0usize, |w, p| w.saturating_add(p.path_count()));
                count.saturating_mul(width)
            }
            _ => count,
        })
    }

    fn fmt_indent(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let indent = depth * 2;
        for instr in &self.instructions {
            match instr {
                Instruction::AddPcrValue { alg, pcr, value } => writeln!(
                    f,
                    "{:indent$}AddPcrValue(PCR{pcr},{alg}): {}",
                    "",
                    buf_to_hex_str(value)
                )?,
                Instruction::AddPcrValueFromTpm { alg, pcr } => {
                    writeln!(f, "{:indent$}AddPcrValueFromTpm(PCR{pcr},{alg})", "")?
                }
                Instruction::ExtendPcr { alg, pcr, digest } => writeln!(
                    f,
                    "{:indent$}ExtendPcr(PCR{pcr},{alg}): {}",
                    "",
                    buf_to_hex_str(digest)
                )?,
                Instruction::AddProfileOr(alternatives) => {
                    writeln!(f, "{:indent$}AddProfileOr(", "")?;
                    for (i, p) in alternatives.iter().enumerate() {
                        writeln!(f, "{:indent$}  Branch {i}:", "")?;
                        p.fmt_indent(f, depth + 2)?;
                    }
                    writeln!(f, "{:indent$})", "")?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indent(f, 0)
    }
}

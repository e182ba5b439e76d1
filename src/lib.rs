//! Predict the TPM PCR values produced by a measured boot.
//!
//! A TPM authorization policy can require that some PCRs hold given values
//! before releasing a secret, for example a disk encryption key. To build
//! such a policy ahead of time, we need every set of PCR values that a valid
//! boot can produce. This crate models the boot as a [Profile]: a sequence
//! of PCR assignments and extensions, with branches where the boot may take
//! alternative paths (recovery mode, several models, several signing keys).
//! Evaluating the profile yields one [PcrValues] per path.
//!
//! # Example
//!
//! ```
//! use pcr_profile::boot_profile::*;
//! use pcr_profile::{HashAlgorithmId, Profile};
//!
//! let mut profile = Profile::new();
//! let params = SystemdEfiStubProfileParams {
//!     pcr_algorithm: HashAlgorithmId::SHA256,
//!     pcr_index: 12,
//!     kernel_cmdlines: vec![
//!         "quiet snapd_recovery_mode=run".to_string(),
//!         "quiet snapd_recovery_mode=recover".to_string(),
//!     ],
//! };
//! add_systemd_efi_stub_profile(&mut profile, &params).unwrap();
//!
//! let values = profile.compute_pcr_values(None).unwrap();
//! assert_eq!(values.len(), 2);
//! ```
//!
//! # Boot events
//!
//! The systemd EFI stub measures the kernel command line into PCR 12 (PCR 8
//! with older versions). On Ubuntu Core, the boot chain then measures the
//! snap system epoch and the model assertion. The functions in [measure]
//! perform these measurements on a live TPM, using the same digests as the
//! predictions.

#![warn(missing_docs)]
/// Profiles that add the measurements of boot components
pub mod boot_profile;
/// Digests of measured events
pub mod event_digest;
/// Hash and extend primitives
pub mod hash;
/// Measure boot events into a TPM
pub mod measure;
/// The profile model
pub mod profile;
/// Profile description files
pub mod profile_config;
/// Hex helpers
pub mod utils;

// mod evaluate implements Profile evaluation
mod evaluate;

pub use evaluate::{compute_pcr_digests, PATH_COUNT_WARNING};
pub use profile::{Instruction, Profile, ProfileError};
pub use tpm2::{Digest, HashAlgorithmId, PcrSelection, PcrValues, Tpm};

//!
//! Measure boot events into a TPM. The digests are computed by the same
//! functions as the predicted ones.
//!
use tpm2::{Digest, HashAlgorithmId, Tpm, PLATFORM_PCRS};

use crate::event_digest::*;
use crate::profile::ProfileError;
use crate::utils::buf_to_hex_str;

type Result<T> = core::result::Result<T, ProfileError>;

// Extend PCR `pcr` of every bank allocated on the TPM with the digest of one
// event. All digests are computed before the first extend, so an unsupported
// bank doesn't leave a partial measurement.
fn measure_to_tpm<T, F>(tpm: &mut T, pcr: u32, event: &str, compute_digest: F) -> Result<()>
where
    T: Tpm + ?Sized,
    F: Fn(HashAlgorithmId) -> Result<Digest>,
{
    if pcr >= PLATFORM_PCRS {
        return Err(ProfileError::InvalidPcrIndex(pcr));
    }

    let banks = tpm.supported_banks()?;
    if banks.is_empty() {
        log::warn!("no PCR bank to measure {event} into");
    }
    let digests = banks
        .into_iter()
        .map(|alg| Ok((alg, compute_digest(alg)?)))
        .collect::<Result<Vec<_>>>()?;

    for (alg, digest) in digests {
        log::debug!(
            "measuring {event} into PCR{pcr},{alg}: {}",
            buf_to_hex_str(&digest)
        );
        tpm.pcr_extend(alg, pcr, &digest)?;
    }
    Ok(())
}

/// Measure the kernel command line into `pcr`, as the systemd EFI stub does
pub fn measure_systemd_efi_stub_cmdline_to_tpm<T: Tpm + ?Sized>(
    tpm: &mut T,
    pcr: u32,
    cmdline: &str,
) -> Result<()> {
    measure_to_tpm(tpm, pcr, "kernel command line", |alg| {
        compute_systemd_efi_stub_cmdline_digest(alg, cmdline)
    })
}

/// Measure the snap model into `pcr`
pub fn measure_snap_model_to_tpm<T: Tpm + ?Sized>(
    tpm: &mut T,
    pcr: u32,
    model: &SnapModel,
) -> Result<()> {
    measure_to_tpm(tpm, pcr, "snap model", |alg| {
        compute_snap_model_digest(alg, model)
    })
}

/// Measure the current snap system epoch into `pcr`
pub fn measure_snap_system_epoch_to_tpm<T: Tpm + ?Sized>(tpm: &mut T, pcr: u32) -> Result<()> {
    measure_to_tpm(tpm, pcr, "snap system epoch", |alg| {
        compute_snap_system_epoch_digest(alg, ZERO_SNAP_SYSTEM_EPOCH)
    })
}

//!
//! Add to a profile the measurements performed by boot components
//!
use serde::{Deserialize, Serialize};
use tpm2::HashAlgorithmId;

use crate::event_digest::*;
use crate::profile::{check_pcr, Profile, ProfileError};

type Result<T> = core::result::Result<T, ProfileError>;

/// Measurements of the systemd EFI stub
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SystemdEfiStubProfileParams {
    /// PCR bank
    pub pcr_algorithm: HashAlgorithmId,
    /// PCR where the stub measures the kernel command line, usually 12 (8 on
    /// older systemd)
    pub pcr_index: u32,
    /// Kernel command lines the stub may pass to the kernel
    pub kernel_cmdlines: Vec<String>,
}

/// Measurements of the snap model
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SnapModelProfileParams {
    /// PCR bank
    pub pcr_algorithm: HashAlgorithmId,
    /// PCR where the model is measured
    pub pcr_index: u32,
    /// Models the system may boot with
    pub models: Vec<SnapModel>,
}

/// Add the kernel command line measured by the systemd EFI stub: one
/// alternative per command line.
pub fn add_systemd_efi_stub_profile(
    profile: &mut Profile,
    params: &SystemdEfiStubProfileParams,
) -> Result<()> {
    let alg = params.pcr_algorithm;
    let pcr = params.pcr_index;
    check_pcr(alg, pcr)?;
    if params.kernel_cmdlines.is_empty() {
        return Err(ProfileError::EmptyAlternativeSet("kernel command line"));
    }

    let mut alternatives = Vec::with_capacity(params.kernel_cmdlines.len());
    for cmdline in &params.kernel_cmdlines {
        let digest = compute_systemd_efi_stub_cmdline_digest(alg, cmdline)?;
        let mut p = Profile::new();
        p.extend_pcr(alg, pcr, &digest)?;
        alternatives.push(p);
    }
    profile.add_profile_or(alternatives)?;
    Ok(())
}

/// Add the snap model measurement: the system epoch, followed by one
/// alternative per model.
pub fn add_snap_model_profile(
    profile: &mut Profile,
    params: &SnapModelProfileParams,
) -> Result<()> {
    let alg = params.pcr_algorithm;
    let pcr = params.pcr_index;
    check_pcr(alg, pcr)?;
    if params.models.is_empty() {
        return Err(ProfileError::EmptyAlternativeSet("snap model"));
    }

    let mut measurements = Profile::new();
    let epoch = compute_snap_system_epoch_digest(alg, ZERO_SNAP_SYSTEM_EPOCH)?;
    measurements.extend_pcr(alg, pcr, &epoch)?;

    let mut alternatives = Vec::with_capacity(params.models.len());
    for model in &params.models {
        let digest = compute_snap_model_digest(alg, model)?;
        let mut p = Profile::new();
        p.extend_pcr(alg, pcr, &digest)?;
        alternatives.push(p);
    }
    measurements.add_profile_or(alternatives)?;

    profile.append(measurements);
    Ok(())
}

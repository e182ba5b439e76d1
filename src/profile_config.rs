//!
//! Profile description files
//!
//! A TOML file lists initial PCR values and the measurements of boot
//! components:
//!
//! ```toml
//! [[pcr-values]]
//! algorithm = "sha256"
//! pcr = 7
//! value = "424816d020cf3d793ac021da47379bdf608080a83eb9364a7fbe0bdfa87111d7"
//!
//! [systemd-efi-stub]
//! pcr-algorithm = "sha256"
//! pcr-index = 12
//! kernel-cmdlines = ["snapd_recovery_mode=run", "snapd_recovery_mode=recover"]
//!
//! [snap-model]
//! pcr-algorithm = "sha256"
//! pcr-index = 12
//!
//! [[snap-model.models]]
//! authority-id = "fake-brand"
//! series = "16"
//! brand-id = "fake-brand"
//! model = "fake-model"
//! grade = "secured"
//! sign-key-sha3-384 = "Jv8_JiHiIzJVcO9M55pPdqSDWUvuhfDIBJUS-3VW7F_idjix7Ffn5qMxB21ZQuij"
//! ```
//!
use std::fs;
use std::str::FromStr;

use serde::Deserialize;
use tpm2::{Digest, HashAlgorithmId};

use crate::boot_profile::*;
use crate::profile::{Profile, ProfileError};
use crate::utils::hex_str_to_buf;

type Result<T> = core::result::Result<T, ProfileError>;

/// Initial value of a PCR. On the command-line, written `alg:pcr=hex`, for
/// example `sha256:7=4248...11d7`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitialPcrValue {
    /// PCR bank
    pub algorithm: HashAlgorithmId,
    /// PCR index
    pub pcr: u32,
    /// Value as a hex string
    pub value: String,
}

impl InitialPcrValue {
    fn digest(&self) -> Result<Digest> {
        hex_str_to_buf(&self.value).ok_or_else(|| {
            ProfileError::Config(format!("invalid PCR value '{}'", self.value))
        })
    }

    /// Add this value to the profile
    pub fn add_to_profile(&self, profile: &mut Profile) -> Result<()> {
        profile.add_pcr_value(self.algorithm, self.pcr, &self.digest()?)?;
        Ok(())
    }
}

impl FromStr for InitialPcrValue {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ProfileError::Config(format!("expected alg:pcr=hex, got '{s}'"));
        let (alg, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (pcr, value) = rest.split_once('=').ok_or_else(invalid)?;

        let v = InitialPcrValue {
            algorithm: alg.parse()?,
            pcr: pcr.parse().map_err(|_| invalid())?,
            value: value.to_string(),
        };
        v.digest()?;
        Ok(v)
    }
}

/// Content of a profile file
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProfileConfig {
    /// Initial PCR values
    #[serde(default)]
    pub pcr_values: Vec<InitialPcrValue>,
    /// Kernel command lines measured by the systemd EFI stub
    pub systemd_efi_stub: Option<SystemdEfiStubProfileParams>,
    /// Snap models
    pub snap_model: Option<SnapModelProfileParams>,
}

impl ProfileConfig {
    /// Load a profile file
    pub fn from_file(filename: &str) -> Result<Self> {
        let content = fs::read_to_string(filename).map_err(|e| ProfileError::File {
            filename: filename.to_string(),
            e,
        })?;
        toml::from_str(&content)
            .map_err(|e| ProfileError::Config(format!("cannot parse {filename}: {e}")))
    }

    /// Parse the TOML content of a profile file
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProfileError::Config(e.message().to_string()))
    }

    /// Append the measurements described by this file to `profile`: initial
    /// values, then the kernel command line, then the snap model. On error,
    /// the profile isn't modified.
    pub fn add_to_profile(&self, profile: &mut Profile) -> Result<()> {
        let mut p = Profile::new();
        for value in &self.pcr_values {
            value.add_to_profile(&mut p)?;
        }
        if let Some(params) = &self.systemd_efi_stub {
            add_systemd_efi_stub_profile(&mut p, params)?;
        }
        if let Some(params) = &self.snap_model {
            add_snap_model_profile(&mut p, params)?;
        }
        profile.append(p);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Instruction;

    const CONFIG: &str = r#"
        [[pcr-values]]
        algorithm = "sha256"
        pcr = 7
        value = "424816d020cf3d793ac021da47379bdf608080a83eb9364a7fbe0bdfa87111d7"

        [snap-model]
        pcr-algorithm = "sha256"
        pcr-index = 12

        [[snap-model.models]]
        authority-id = "fake-brand"
        series = "16"
        brand-id = "fake-brand"
        model = "fake-model"
        grade = "secured"
        sign-key-sha3-384 = "Jv8_JiHiIzJVcO9M55pPdqSDWUvuhfDIBJUS-3VW7F_idjix7Ffn5qMxB21ZQuij"

        [systemd-efi-stub]
        pcr-algorithm = "sha256"
        pcr-index = 12
        kernel-cmdlines = ["a", "b"]
    "#;

    #[test]
    fn test_parse() {
        let config = ProfileConfig::parse(CONFIG).unwrap();
        assert_eq!(config.pcr_values.len(), 1);
        assert_eq!(config.pcr_values[0].pcr, 7);
        assert_eq!(config.systemd_efi_stub.as_ref().unwrap().kernel_cmdlines, ["a", "b"]);
        assert_eq!(config.snap_model.as_ref().unwrap().models.len(), 1);

        let config = ProfileConfig::parse("").unwrap();
        assert_eq!(config, ProfileConfig::default());

        assert!(ProfileConfig::parse("[unknown]").is_err());
        assert!(ProfileConfig::parse("[systemd-efi-stub]\npcr-index = 12").is_err());
    }

    #[test]
    fn test_add_to_profile() {
        let config = ProfileConfig::parse(CONFIG).unwrap();
        let mut p = Profile::new();
        config.add_to_profile(&mut p).unwrap();

        // Stub measurements come before the model, regardless of the order
        // in the file
        let instrs = p.instructions();
        assert_eq!(instrs.len(), 4);
        assert!(matches!(instrs[0], Instruction::AddPcrValue { pcr: 7, .. }));
        assert!(matches!(&instrs[1], Instruction::AddProfileOr(a) if a.len() == 2));
        assert!(matches!(instrs[2], Instruction::ExtendPcr { pcr: 12, .. }));
        assert!(matches!(&instrs[3], Instruction::AddProfileOr(a) if a.len() == 1));

        // Nothing is added on error
        let config = ProfileConfig::parse(
            r#"
            [[pcr-values]]
            algorithm = "sha256"
            pcr = 7
            value = "00"
            "#,
        )
        .unwrap();
        let mut p = Profile::new();
        assert!(matches!(
            config.add_to_profile(&mut p),
            Err(ProfileError::DigestLengthMismatch { len: 1, .. })
        ));
        assert!(p.is_empty());
    }

    #[test]
    fn test_initial_value() {
        let v: InitialPcrValue = "sha1:4=a9993e364706816aba3e25717850c26c9cd0d89d"
            .parse()
            .unwrap();
        assert_eq!(v.algorithm, HashAlgorithmId::SHA1);
        assert_eq!(v.pcr, 4);

        assert!("sha1:4".parse::<InitialPcrValue>().is_err());
        assert!("sha1=4:00".parse::<InitialPcrValue>().is_err());
        assert!("sha1:x=00".parse::<InitialPcrValue>().is_err());
        assert!("md5:4=00".parse::<InitialPcrValue>().is_err());
        assert!("sha1:4=xyz".parse::<InitialPcrValue>().is_err());
    }

    #[test]
    fn test_from_file() {
        assert!(matches!(
            ProfileConfig::from_file("does/not/exist.toml"),
            Err(ProfileError::File { .. })
        ));
    }
}

//!
//! Compute the digests of the events measured during boot, exactly as the
//! measuring component does. Any change to these encodings invalidates the
//! policies built from predicted PCR values.
//!
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use tpm2::{Digest, HashAlgorithmId};

use crate::hash::new_hasher;
use crate::profile::ProfileError;

type Result<T> = core::result::Result<T, ProfileError>;

/// The snap system epoch, measured before the model. It will be incremented
/// when the measurement sequence changes in an incompatible way.
pub const ZERO_SNAP_SYSTEM_EPOCH: u32 = 0;

/// Digest of the kernel command line, as measured by the systemd EFI stub.
///
/// The stub measures the LoadOptions it passes to the kernel: the UCS-2
/// string, little-endian, including its NUL terminator.
pub fn compute_systemd_efi_stub_cmdline_digest(
    alg: HashAlgorithmId,
    cmdline: &str,
) -> Result<Digest> {
    let mut hasher = new_hasher(alg)?;
    for c in cmdline.encode_utf16().chain([0]) {
        hasher.write_u16::<LittleEndian>(c)?;
    }
    Ok(hasher.finish()?.to_vec())
}

/// Digest of the snap system epoch
pub fn compute_snap_system_epoch_digest(alg: HashAlgorithmId, epoch: u32) -> Result<Digest> {
    let mut hasher = new_hasher(alg)?;
    hasher.write_u32::<LittleEndian>(epoch)?;
    Ok(hasher.finish()?.to_vec())
}

/// Grade of a snap model
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelGrade {
    /// The model doesn't specify a grade
    #[default]
    Unset,
    /// Development system
    Dangerous,
    /// Signed system
    Signed,
    /// Secured system
    Secured,
}

impl ModelGrade {
    /// Code measured along with the model
    pub fn code(&self) -> u32 {
        match self {
            ModelGrade::Unset => 0,
            ModelGrade::Dangerous => 0x10000,
            ModelGrade::Signed => 0x80000,
            ModelGrade::Secured => 0x100000,
        }
    }
}

impl FromStr for ModelGrade {
    type Err = ProfileError;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "unset" => Ok(ModelGrade::Unset),
            "dangerous" => Ok(ModelGrade::Dangerous),
            "signed" => Ok(ModelGrade::Signed),
            "secured" => Ok(ModelGrade::Secured),
            _ => Err(ProfileError::Config(format!("unknown model grade '{s}'"))),
        }
    }
}

impl fmt::Display for ModelGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelGrade::Unset => "unset",
            ModelGrade::Dangerous => "dangerous",
            ModelGrade::Signed => "signed",
            ModelGrade::Secured => "secured",
        };
        write!(f, "{name}")
    }
}

impl TryFrom<String> for ModelGrade {
    type Error = ProfileError;
    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ModelGrade> for String {
    fn from(grade: ModelGrade) -> String {
        grade.to_string()
    }
}

/// Fields of a verified snap model assertion. Only the brand, model, series,
/// grade and signing key are measured. Other assertion headers are ignored
/// when deserializing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SnapModel {
    /// Authority that signed the assertion. Bound through the signing key, not
    /// measured.
    pub authority_id: String,
    /// Assertion series, for example "16"
    pub series: String,
    /// Brand of the device
    pub brand_id: String,
    /// Model name
    pub model: String,
    /// Model grade
    #[serde(default)]
    pub grade: ModelGrade,
    /// SHA3-384 hash of the signing key, in unpadded base64url
    #[serde(rename = "sign-key-sha3-384")]
    pub sign_key_sha3_384: String,
}

impl SnapModel {
    /// Decode the signing key hash
    pub fn sign_key_id(&self) -> Result<Vec<u8>> {
        let key = URL_SAFE_NO_PAD
            .decode(&self.sign_key_sha3_384)
            .map_err(|e| ProfileError::InvalidSignKeyId(format!("{e}")))?;
        if Some(key.len()) != HashAlgorithmId::SHA384.size() {
            return Err(ProfileError::InvalidSignKeyId(format!(
                "invalid length {}",
                key.len()
            )));
        }
        Ok(key)
    }
}

/// Digest of a snap model.
///
/// Variable-length fields are separated by hashing them into a chain:
///
/// ```text
/// d1 = H(u16 key_alg || sign_key_id || brand_id)
/// d2 = H(d1 || model)
/// d3 = H(d2 || series || u32 grade)
/// ```
///
/// Integers are little-endian, and key_alg is the TPM ID of SHA-384, the size
/// of a SHA3-384 key ID.
pub fn compute_snap_model_digest(alg: HashAlgorithmId, model: &SnapModel) -> Result<Digest> {
    let key_id = model.sign_key_id()?;

    let mut hasher = new_hasher(alg)?;
    hasher.write_u16::<LittleEndian>(HashAlgorithmId::SHA384.0)?;
    hasher.write_all(&key_id)?;
    hasher.write_all(model.brand_id.as_bytes())?;
    let brand_digest = hasher.finish()?;

    let mut hasher = new_hasher(alg)?;
    hasher.write_all(&brand_digest)?;
    hasher.write_all(model.model.as_bytes())?;
    let model_digest = hasher.finish()?;

    let mut hasher = new_hasher(alg)?;
    hasher.write_all(&model_digest)?;
    hasher.write_all(model.series.as_bytes())?;
    hasher.write_u32::<LittleEndian>(model.grade.code())?;
    Ok(hasher.finish()?.to_vec())
}

#![allow(dead_code)]

use pcr_profile::event_digest::{ModelGrade, SnapModel};
use pcr_profile::utils::{buf_to_hex_str, hex_str_to_buf};
use pcr_profile::{HashAlgorithmId, PcrValues};

pub const SIGN_KEY: &str = "Jv8_JiHiIzJVcO9M55pPdqSDWUvuhfDIBJUS-3VW7F_idjix7Ffn5qMxB21ZQuij";
pub const OTHER_SIGN_KEY: &str =
    "GQ2ARdxYdcEATk3THxMZTuolBDz5_8QFUMyjD9yuIPjX7tBfPJQFiyBjKdvo0jEu";

/// Value of a PCR that was extended once with the digest of "foo"
pub const FOO: &str = "424816d020cf3d793ac021da47379bdf608080a83eb9364a7fbe0bdfa87111d7";
/// Value of a PCR that was extended once with the digest of "bar"
pub const BAR: &str = "a98b1d896c9383603b7923fffe230c9e4df24218eb84c90c5c758e63ce62843c";

pub fn decode_hex(s: &str) -> Vec<u8> {
    hex_str_to_buf(s).unwrap()
}

/// Build PCR values from (alg, pcr, hex) triplets
pub fn pcr_values(entries: &[(HashAlgorithmId, u32, &str)]) -> PcrValues {
    entries
        .iter()
        .map(|(alg, pcr, hex)| (*alg, *pcr, decode_hex(hex)))
        .collect()
}

/// Hex value of one PCR in each element of `values`
pub fn pcr_hex(values: &[PcrValues], alg: HashAlgorithmId, pcr: u32) -> Vec<String> {
    values
        .iter()
        .map(|v| buf_to_hex_str(v.get(alg, pcr).unwrap()))
        .collect()
}

pub fn snap_model(
    brand: &str,
    model: &str,
    series: &str,
    grade: ModelGrade,
    key: &str,
) -> SnapModel {
    SnapModel {
        authority_id: brand.to_string(),
        series: series.to_string(),
        brand_id: brand.to_string(),
        model: model.to_string(),
        grade,
        sign_key_sha3_384: key.to_string(),
    }
}

pub fn fake_model() -> SnapModel {
    snap_model("fake-brand", "fake-model", "16", ModelGrade::Secured, SIGN_KEY)
}

//! A software PCR bank implementing the [Tpm] trait
use std::collections::BTreeMap;

use crate::*;

/// Software implementation of the TPM PCR commands. All PCRs of all banks
/// start at zero, as they would after a TPM2_Startup(CLEAR).
#[derive(Clone, Debug)]
pub struct SoftTpm {
    banks: BTreeMap<HashAlgorithmId, Vec<Digest>>,
}

impl SoftTpm {
    /// Create a TPM with PCR banks for each algorithm in `algs`
    pub fn new(algs: &[HashAlgorithmId]) -> Result<Self> {
        let mut banks = BTreeMap::new();
        for alg in algs {
            if !alg.is_supported() {
                return Err(Tpm2Error::UnsupportedAlgorithm(*alg));
            }
            let zero = alg.zero_digest()?;
            banks.insert(*alg, vec![zero; PLATFORM_PCRS as usize]);
        }
        Ok(SoftTpm { banks })
    }

    fn bank(&self, alg: HashAlgorithmId) -> Result<&Vec<Digest>> {
        self.banks
            .get(&alg)
            .ok_or(Tpm2Error::UnsupportedAlgorithm(alg))
    }
}

impl Tpm for SoftTpm {
    fn supported_banks(&mut self) -> Result<Vec<HashAlgorithmId>> {
        Ok(self.banks.keys().copied().collect())
    }

    fn pcr_read(&mut self, selection: &[PcrSelection]) -> Result<PcrValues> {
        let mut values = PcrValues::new();
        for sel in selection {
            let bank = self.bank(sel.hash)?;
            for &pcr in &sel.select {
                check_pcr_index(pcr)?;
                values.set(sel.hash, pcr, bank[pcr as usize].clone());
            }
        }
        Ok(values)
    }

    fn pcr_extend(&mut self, alg: HashAlgorithmId, pcr: u32, digest: &[u8]) -> Result<()> {
        check_pcr_index(pcr)?;
        let bank = self
            .banks
            .get_mut(&alg)
            .ok_or(Tpm2Error::UnsupportedAlgorithm(alg))?;

        if Some(digest.len()) != alg.size() {
            return Err(Tpm2Error::DigestLength {
                alg,
                len: digest.len(),
            });
        }

        let value = &mut bank[pcr as usize];
        let mut hasher = alg.new_hasher()?;
        hasher.update(value)?;
        hasher.update(digest)?;
        *value = hasher.finish()?.to_vec();
        log::trace!("PCR{pcr},{alg} extended to {value:02x?}");
        Ok(())
    }
}

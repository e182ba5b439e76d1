//!
//! Enumerate the PCR values that a profile can produce
//!
use std::collections::{BTreeMap, BTreeSet};

use tpm2::{Digest, HashAlgorithmId, PcrSelection, PcrValues, Tpm, Tpm2Error};

use crate::hash;
use crate::profile::{Instruction, Profile, ProfileError};

type Result<T> = core::result::Result<T, ProfileError>;

/// Above this number of paths, evaluating a profile prints a warning
pub const PATH_COUNT_WARNING: usize = 4096;

// A path being walked: its PCR values and the instructions left to run. The
// last slice is the innermost sub-profile, and once it is exhausted the walk
// resumes with the instructions that follow the branch.
type PathState<'a> = (PcrValues, Vec<&'a [Instruction]>);

impl Profile {
    /// Compute all the PCR values this profile can produce, starting from
    /// `initial`, or from an empty set of values.
    ///
    /// Every value in `initial` must have the size of its bank's digests.
    ///
    /// Returns one [PcrValues] per path through the branches, in depth-first
    /// order. Identical values from different paths are kept. PCRs that no
    /// instruction touches are absent from the result unless `initial`
    /// contains them. A PCR extended without a previous value starts from
    /// zero.
    pub fn compute_pcr_values(&self, initial: Option<&PcrValues>) -> Result<Vec<PcrValues>> {
        self.evaluate(initial, None)
    }

    /// Same as [Profile::compute_pcr_values], reading from `tpm` the values of
    /// [Instruction::AddPcrValueFromTpm]. All PCRs are read with a single
    /// command, before evaluation. A value returned with the wrong size for
    /// its bank is a device error.
    pub fn compute_pcr_values_with_tpm<T: Tpm + ?Sized>(
        &self,
        tpm: &mut T,
        initial: Option<&PcrValues>,
    ) -> Result<Vec<PcrValues>> {
        let selection = self.tpm_selection();
        if selection.is_empty() {
            return self.evaluate(initial, None);
        }
        let tpm_values = tpm.pcr_read(&selection)?;
        for (alg, _, value) in tpm_values.iter() {
            if hash::check_algorithm(alg)? != value.len() {
                return Err(Tpm2Error::DigestLength {
                    alg,
                    len: value.len(),
                }
                .into());
            }
        }
        self.evaluate(initial, Some(&tpm_values))
    }

    // The PCRs read by AddPcrValueFromTpm anywhere in the tree
    fn tpm_selection(&self) -> Vec<PcrSelection> {
        fn collect(p: &Profile, sel: &mut BTreeMap<HashAlgorithmId, BTreeSet<u32>>) {
            for instr in p.instructions() {
                match instr {
                    Instruction::AddPcrValueFromTpm { alg, pcr } => {
                        sel.entry(*alg).or_default().insert(*pcr);
                    }
                    Instruction::AddProfileOr(alternatives) => {
                        for alt in alternatives {
                            collect(alt, sel);
                        }
                    }
                    _ => (),
                }
            }
        }

        let mut sel = BTreeMap::new();
        collect(self, &mut sel);
        sel.into_iter()
            .map(|(hash, select)| PcrSelection { hash, select })
            .collect()
    }

    fn evaluate(
        &self,
        initial: Option<&PcrValues>,
        tpm_values: Option<&PcrValues>,
    ) -> Result<Vec<PcrValues>> {
        let count = self.path_count();
        log::debug!("evaluating {count} paths");
        if count > PATH_COUNT_WARNING {
            log::warn!("profile has {count} possible PCR states");
        }

        let initial = match initial {
            Some(values) => {
                for (alg, _, value) in values.iter() {
                    hash::check_digest(alg, value)?;
                }
                values.clone()
            }
            None => PcrValues::new(),
        };
        let mut results = Vec::new();
        // Paths that branched off and haven't been walked yet. The top of the
        // stack is the next one in depth-first order.
        let mut pending: Vec<PathState> = vec![(initial, vec![self.instructions()])];

        while let Some((mut values, mut cont)) = pending.pop() {
            while let Some(next) = cont.last_mut() {
                let instructions = *next;
                let Some((instr, rest)) = instructions.split_first() else {
                    cont.pop();
                    continue;
                };
                *next = rest;

                match instr {
                    Instruction::AddPcrValue { alg, pcr, value } => {
                        values.set(*alg, *pcr, value.clone());
                    }
                    Instruction::AddPcrValueFromTpm { alg, pcr } => {
                        let tpm_values = tpm_values.ok_or(ProfileError::MissingTpm)?;
                        let value = tpm_values
                            .get(*alg, *pcr)
                            .ok_or(ProfileError::MissingPcrValue {
                                alg: *alg,
                                pcr: *pcr,
                            })?;
                        values.set(*alg, *pcr, value.clone());
                    }
                    Instruction::ExtendPcr { alg, pcr, digest } => {
                        let zero;
                        let old = match values.get(*alg, *pcr) {
                            Some(v) => v,
                            None => {
                                zero = hash::zero_digest(*alg)?;
                                &zero
                            }
                        };
                        let new = hash::extend(*alg, old, digest)?;
                        values.set(*alg, *pcr, new);
                    }
                    Instruction::AddProfileOr(alternatives) => {
                        let Some((first, others)) = alternatives.split_first() else {
                            return Err(ProfileError::EmptyAlternativeSet("profile branch"));
                        };
                        // Stack the other alternatives in reverse, so they are
                        // popped in declaration order.
                        for alt in others.iter().rev() {
                            let mut alt_cont = cont.clone();
                            alt_cont.push(alt.instructions());
                            pending.push((values.clone(), alt_cont));
                        }
                        cont.push(first.instructions());
                    }
                }
            }
            results.push(values);
        }
        Ok(results)
    }
}

/// Compute the PCR digests of `values`, as used by TPM2_PolicyPCR.
///
/// The selection is the union of all PCRs present in `values`, sorted by
/// algorithm and index. Each digest is the `alg` hash of the concatenated PCR
/// values in selection order, one digest per element of `values`. Every
/// element must hold a value for every selected PCR.
pub fn compute_pcr_digests(
    values: &[PcrValues],
    alg: HashAlgorithmId,
) -> Result<(Vec<PcrSelection>, Vec<Digest>)> {
    hash::check_algorithm(alg)?;

    let mut union: BTreeMap<HashAlgorithmId, BTreeSet<u32>> = BTreeMap::new();
    for v in values {
        for sel in v.selection() {
            union.entry(sel.hash).or_default().extend(sel.select);
        }
    }
    let selection: Vec<PcrSelection> = union
        .into_iter()
        .map(|(hash, select)| PcrSelection { hash, select })
        .collect();

    let mut digests = Vec::with_capacity(values.len());
    for v in values {
        let mut hasher = hash::new_hasher(alg)?;
        for sel in &selection {
            for &pcr in &sel.select {
                let value = v.get(sel.hash, pcr).ok_or(ProfileError::MissingPcrValue {
                    alg: sel.hash,
                    pcr,
                })?;
                hasher.update(value)?;
            }
        }
        digests.push(hasher.finish()?.to_vec());
    }
    Ok((selection, digests))
}

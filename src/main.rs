use std::collections::BTreeMap;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use pcr_profile::boot_profile::*;
use pcr_profile::profile_config::ProfileConfig;
use pcr_profile::utils::buf_to_hex_str;
use pcr_profile::{compute_pcr_digests, PcrValues, Profile};

mod command_line;

use command_line::*;

fn build_profile(args: &Args) -> Result<Profile> {
    let mut profile = Profile::new();

    for value in &args.pcr_value {
        value.add_to_profile(&mut profile)?;
    }

    for filename in &args.config {
        let config = ProfileConfig::from_file(filename)?;
        config
            .add_to_profile(&mut profile)
            .with_context(|| format!("invalid profile {filename}"))?;
    }

    if !args.kernel_cmdline.is_empty() {
        let params = SystemdEfiStubProfileParams {
            pcr_algorithm: args.pcr_algorithm,
            pcr_index: args.kernel_cmdline_pcr,
            kernel_cmdlines: args.kernel_cmdline.clone(),
        };
        add_systemd_efi_stub_profile(&mut profile, &params)
            .context("invalid kernel command line")?;
    }

    log::debug!("{} possible PCR states", profile.path_count());
    log::trace!("Profile:\n{profile}");
    Ok(profile)
}

fn values_to_json(values: &[PcrValues]) -> Result<String> {
    let out: Vec<BTreeMap<String, BTreeMap<u32, String>>> = values
        .iter()
        .map(|v| {
            let mut banks: BTreeMap<String, BTreeMap<u32, String>> = BTreeMap::new();
            for (alg, pcr, digest) in v.iter() {
                banks
                    .entry(alg.to_string())
                    .or_default()
                    .insert(pcr, buf_to_hex_str(digest));
            }
            banks
        })
        .collect();
    Ok(serde_json::to_string_pretty(&out)?)
}

fn run(args: &Args) -> Result<()> {
    let profile = build_profile(args)?;
    let values = profile
        .compute_pcr_values(None)
        .context("cannot compute PCR values")?;

    if let Some(alg) = args.pcr_digests {
        let (selection, digests) = compute_pcr_digests(&values, alg)?;
        let selection: Vec<String> = selection.iter().map(|s| s.to_string()).collect();
        println!("Selection: {}", selection.join(" "));
        for (i, digest) in digests.iter().enumerate() {
            println!("Digest {i}: {}", buf_to_hex_str(digest));
        }
    } else if args.json {
        println!("{}", values_to_json(&values)?);
    } else {
        for (i, v) in values.iter().enumerate() {
            println!("Value {i}:");
            for (alg, pcr, digest) in v.iter() {
                println!(" PCR{pcr},{alg}: {}", buf_to_hex_str(digest));
            }
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = stderrlog::new()
        .module(module_path!())
        .module("tpm2")
        .verbosity(1 + args.verbose as usize)
        .init()
    {
        eprintln!("cannot initialize logging: {e}");
    }

    if let Err(e) = run(&args) {
        log::error!("{e:#}");
        process::exit(1);
    }
}

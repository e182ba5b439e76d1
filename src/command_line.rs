/// Parse the main command-line
///
use clap::Parser;

use pcr_profile::profile_config::InitialPcrValue;
use pcr_profile::HashAlgorithmId;

// This is the help blurb:
/// Compute all PCR values that a measured boot can produce. The boot is
/// described by profile files and command-line arguments, and each
/// alternative adds a branch to the profile.
///
/// Example:
///   pcr-profile -c snap-model.toml
///     --kernel-cmdline "console=ttyS0 snapd_recovery_mode=run"
///     --kernel-cmdline "console=ttyS0 snapd_recovery_mode=recover"
#[derive(Debug, Parser)]
#[command(version, long_about, verbatim_doc_comment, arg_required_else_help = true)]
pub struct Args {
    /// Display more information (use multiple times to increase verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Profile file. Can be specified multiple times, files are applied in
    /// order.
    #[arg(short, long, value_name = "file")]
    pub config: Vec<String>,

    /// Initial PCR value, applied before the profile files. Can be specified
    /// multiple times.
    #[arg(long, value_name = "alg:pcr=hex")]
    pub pcr_value: Vec<InitialPcrValue>,

    /// Kernel command line measured by the systemd EFI stub. Each one is an
    /// alternative, applied after the profile files.
    #[arg(long, value_name = "cmdline")]
    pub kernel_cmdline: Vec<String>,

    /// PCR bank for the kernel command line
    #[arg(long, value_name = "alg", default_value = "sha256")]
    pub pcr_algorithm: HashAlgorithmId,

    /// PCR for the kernel command line
    #[arg(long, value_name = "index", default_value_t = 12)]
    pub kernel_cmdline_pcr: u32,

    /// Display PCR values in JSON
    #[arg(long)]
    pub json: bool,

    /// Display the PCR selection and one policy digest per PCR values,
    /// computed with the given algorithm
    #[arg(long, value_name = "alg")]
    pub pcr_digests: Option<HashAlgorithmId>,
}

use super::*;
use std::path::PathBuf;
use structopt::{clap::AppSettings::*, StructOpt};

pub fn parse() -> Result<Options> {
    Ok(Options::from_args())
}

/// Command line of the dispenser client.
///
/// Everything about the remote store and the mirrored path lives in the
/// configuration file; the flags only pick that file, write a fresh one, or
/// raise log output.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "minimunch",
    rename_all = "kebab_case",
    author,
    about,
    settings = &[DeriveDisplayOrder, DisableHelpSubcommand, UnifiedHelpMessage]
)]
pub struct Options {
    /// Location of the client configuration file
    #[structopt(short = "c", long, parse(from_os_str), default_value = "minimunch.toml")]
    pub config: PathBuf,

    /// Generate configuration with default values
    #[structopt(short, long)]
    pub generate: bool,

    /// Verbosity level of output
    #[structopt(short = "v", long, parse(from_occurrences))]
    pub verbosity: u64,
}

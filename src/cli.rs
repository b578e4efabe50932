use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "roundscan",
    version,
    about = "Periodic WiFi sampling and location fingerprinting",
    long_about = "Collect a fixed number of WiFi scan rounds into JSON and CSV exports,\n\
                  and match a recorded table against reference measurements."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one sampling run and export the results
    Scan(ScanArgs),
    /// Find the reference location closest to a recorded table
    Match(MatchArgs),
}

#[derive(Args)]
pub struct ScanArgs {
    /// Number of rounds to collect
    #[arg(long, env = "ROUNDSCAN_ROUNDS")]
    pub rounds: Option<u32>,

    /// Seconds between rounds
    #[arg(long, env = "ROUNDSCAN_INTERVAL")]
    pub interval: Option<u64>,

    /// Directory receiving result_<stamp>.json and .csv
    #[arg(long, env = "ROUNDSCAN_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Upper bound in seconds on a single scan
    #[arg(long)]
    pub poll_timeout: Option<u64>,

    /// Wireless interface scanned with `iw`
    #[arg(long, default_value = "wlan0", conflicts_with = "simulate")]
    pub iface: String,

    /// Use a simulated set of access points instead of `iw`
    #[arg(long)]
    pub simulate: bool,

    /// JSON settings file providing defaults for the flags above
    #[arg(long, env = "ROUNDSCAN_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Write the effective parameters back to the settings file
    #[arg(long, requires = "settings")]
    pub save: bool,
}

#[derive(Args)]
pub struct MatchArgs {
    /// Table to locate (a result_<stamp>.csv)
    pub target: PathBuf,

    /// Directories holding reference tables, one per location
    #[arg(long = "reference", required = true, num_args = 1..)]
    pub references: Vec<PathBuf>,

    /// Treat every reference table as its own location instead of averaging
    /// each directory
    #[arg(long)]
    pub per_file: bool,

    /// Level assumed for an access point seen on one side only (dBm)
    #[arg(long, default_value_t = -99.0, allow_hyphen_values = true)]
    pub missing_level: f64,

    /// Distances at or above this never count as a match
    #[arg(long, default_value_t = 100.0)]
    pub max_distance: f64,
}

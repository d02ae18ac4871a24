//! # CLI Interface
//!
//! Defines the command-line argument structure for `hashdrop-node` using
//! `clap` derive. Supports four subcommands: `run`, `demo`, `keygen`,
//! and `version`.

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// HashDrop escrow keeper.
///
/// Hosts an escrow instance, sweeps expired orders on a fixed interval,
/// serves a read API over the order book, and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "hashdrop-node",
    about = "HashDrop escrow keeper",
    version,
    propagate_version = true
)]
pub struct HashDropNodeCli {
    /// Log output format.
    #[arg(long, global = true, env = "HASHDROP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the HashDrop node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the keeper: expiry sweeps, HTTP API and metrics.
    Run(RunArgs),
    /// Walk one order through its whole lifecycle in-process and print
    /// every balance and event along the way.
    Demo(DemoArgs),
    /// Generate a fresh Ed25519 identity.
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Address to bind the HTTP listeners on.
    #[arg(long, env = "HASHDROP_BIND", default_value = "0.0.0.0")]
    pub bind: String,

    /// Port for the REST API.
    #[arg(long, env = "HASHDROP_API_PORT", default_value_t = 9841)]
    pub api_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "HASHDROP_METRICS_PORT", default_value_t = 9842)]
    pub metrics_port: u16,

    /// Seconds between expiry sweeps.
    #[arg(long, env = "HASHDROP_SWEEP_INTERVAL_SECS", default_value_t = 30)]
    pub sweep_interval_secs: u64,

    /// Hex-encoded address of the dispute arbiter. Disputes cannot be
    /// resolved when unset.
    #[arg(long, env = "HASHDROP_ARBITER")]
    pub arbiter: Option<String>,

    /// Pay the package value to the receiver on delivery instead of
    /// returning it to the emitter.
    #[arg(long, env = "HASHDROP_PRINCIPAL_TO_RECEIVER")]
    pub principal_to_receiver: bool,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Seed for the Groth16 setup and the delivery secret.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Package value in the smallest asset unit.
    #[arg(long, default_value_t = 50_000_000)]
    pub package_value: u64,

    /// Delivery fee in the smallest asset unit.
    #[arg(long, default_value_t = 10_000_000)]
    pub delivery_fee: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        HashDropNodeCli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = HashDropNodeCli::parse_from(["hashdrop-node", "run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.api_port, 9841);
                assert_eq!(args.sweep_interval_secs, 30);
                assert!(args.arbiter.is_none());
                assert!(!args.principal_to_receiver);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn log_format_flag_parses() {
        let cli = HashDropNodeCli::parse_from(["hashdrop-node", "--log-format", "json", "version"]);
        assert_eq!(cli.log_format, LogFormat::Json);
    }
}

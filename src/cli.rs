// cli.rs
use crate::snapshot;
use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use std::io::{self, BufWriter};
use std::path::PathBuf;

/// VAI database inside Rancher pods.
pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/rancher/informer_object_cache.db";

/// Scratch location for the `VACUUM INTO` copy.
pub const DEFAULT_SNAPSHOT_PATH: &str = "/tmp/vai-snapshot.db";

/// Stream a consistent snapshot of the VAI cache database to stdout as base64.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Database to snapshot, opened read-only
    #[arg(long, default_value = DEFAULT_DATABASE_PATH)]
    pub database: PathBuf,
    /// Temporary file for the compacted copy, removed before exit
    #[arg(long, default_value = DEFAULT_SNAPSHOT_PATH)]
    pub snapshot: PathBuf,
}

fn init_logger() {
    // Only the final `ERROR:` line should reach stderr by default.
    // RUST_LOG=debug shows each stage.
    Builder::from_env(Env::default().default_filter_or("error"))
        .format_timestamp_millis()
        .init();
}

/// Parses the command line, exiting with status 1 on bad arguments.
///
/// `--help` and `--version` still print to stdout and exit 0.
fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    }
}

pub fn run() -> Result<()> {
    let cli = parse_args();
    init_logger();

    let stdout = io::stdout();
    let out = BufWriter::new(stdout.lock());
    snapshot::extract(&cli.database, &cli.snapshot, out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_are_fixed_paths() {
        let cli = Cli::try_parse_from(["vai-snapshot"]).unwrap();
        assert_eq!(cli.database, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(cli.snapshot, PathBuf::from(DEFAULT_SNAPSHOT_PATH));
    }

    #[test]
    fn test_unknown_argument_is_an_error() {
        let err = Cli::try_parse_from(["vai-snapshot", "--bogus"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_help_is_not_an_error() {
        let err = Cli::try_parse_from(["vai-snapshot", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_paths_can_be_overridden() {
        let cli = Cli::try_parse_from([
            "vai-snapshot",
            "--database",
            "/data/cache.db",
            "--snapshot",
            "/scratch/copy.db",
        ])
        .unwrap();
        assert_eq!(cli.database, PathBuf::from("/data/cache.db"));
        assert_eq!(cli.snapshot, PathBuf::from("/scratch/copy.db"));
    }
}

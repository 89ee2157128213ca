//! Import subcommand: restore the store from a snapshot document.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the import subcommand
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot file written by `export`, plain or gzip-compressed
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Read and report the snapshot without changing the store
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_parse_import() {
        let cli = Cli::parse_from(["triage-tasks", "import", "backup.json.gz", "--dry-run"]);
        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.file, PathBuf::from("backup.json.gz"));
                assert!(args.dry_run);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["triage-tasks", "import"]).is_err());
    }
}

//! Export subcommand: write the whole store as one snapshot document.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the export subcommand
#[derive(Args, Debug, Default)]
pub struct ExportArgs {
    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Force gzip compression (auto-detected from .gz extension otherwise)
    #[arg(long)]
    pub gzip: bool,

    /// Leave the resolution history out of the snapshot
    #[arg(long)]
    pub no_history: bool,
}

impl ExportArgs {
    /// Whether output should be gzip-compressed.
    pub fn should_compress(&self) -> bool {
        // Explicit --gzip flag always wins
        if self.gzip {
            return true;
        }

        self.output
            .as_ref()
            .is_some_and(|path| path.extension().is_some_and(|ext| ext == "gz"))
    }
}

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Config file (TOML, YAML or JSON). Defaults to the per-user config file, if present.
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files into a gallery folder, printing one JSON record per stored file.
    Upload(UploadArgs),
    /// Print the effective configuration, with secrets redacted.
    Config,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// Folder to store the files under, e.g. `weddings/smith-2026`.
    pub destination: String,

    /// Files to upload.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Preferred number of simultaneous transfers.
    #[arg(long, short = 'j', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Compress files before transfer; optionally naming the codec (`gzip`, `bzip2`, `zstd`, `none`).
    #[arg(long, value_name = "CODEC", num_args = 0..=1, require_equals = true)]
    pub compress: Option<Option<String>>,
}

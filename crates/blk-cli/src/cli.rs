use std::path::PathBuf;

use blk_types::Extension;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "blk",
    about = "Sharded content-addressed blockstore",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store directory (overrides the backend in --config)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store files (or stdin) as blocks
    Put(PutArgs),
    /// Write a block's bytes to stdout or a file
    Get(GetArgs),
    /// Check whether blocks are stored
    Has(KeysArgs),
    /// Remove blocks
    Rm(KeysArgs),
    /// List stored keys
    Ls(LsArgs),
    /// Print the storage key of files without storing them
    Key(KeyArgs),
}

#[derive(Args)]
pub struct PutArgs {
    /// Files to store; reads stdin when empty
    pub files: Vec<PathBuf>,
    #[arg(short, long)]
    pub ext: Option<Extension>,
}

#[derive(Args)]
pub struct GetArgs {
    /// Storage key, base32 name, or hex multihash
    pub key: String,
    #[arg(short, long)]
    pub ext: Option<String>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct KeysArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
    #[arg(short, long)]
    pub ext: Option<String>,
}

#[derive(Args)]
pub struct LsArgs {
    /// Show the hex multihash next to each key
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args)]
pub struct KeyArgs {
    /// Files to hash; reads stdin when empty
    pub files: Vec<PathBuf>,
    #[arg(short, long)]
    pub ext: Option<Extension>,
}

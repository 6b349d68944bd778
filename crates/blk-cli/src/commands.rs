use std::path::{Path, PathBuf};

use anyhow::Context;
use blk_store::{BackendConfig, BlockPayload, Blockstore, BlockstoreConfig, KeyCodec, WriteOutcome};
use colored::Colorize;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::cli::*;

pub const DEFAULT_ROOT: &str = ".blocks";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = store_config(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Put(args) => cmd_put(&Blockstore::open(config)?, args, format).await,
        Command::Get(args) => cmd_get(&Blockstore::open(config)?, args).await,
        Command::Has(args) => cmd_has(&Blockstore::open(config)?, args, format).await,
        Command::Rm(args) => cmd_rm(&Blockstore::open(config)?, args, format).await,
        Command::Ls(args) => cmd_ls(&Blockstore::open(config)?, args, format).await,
        Command::Key(args) => cmd_key(&KeyCodec::from_config(&config), args, format).await,
    }
}

/// Resolve the store configuration: `--config` first, then `--root`.
///
/// A CLI store is always on disk, so a memory backend from the file (or
/// the defaults) becomes a filesystem backend at `--root` or [`DEFAULT_ROOT`].
pub fn store_config(cli: &Cli) -> anyhow::Result<BlockstoreConfig> {
    let mut config = match &cli.config {
        Some(path) => BlockstoreConfig::load(path)?,
        None => BlockstoreConfig::default(),
    };
    match (&cli.root, &config.backend) {
        (Some(root), _) => config.backend = BackendConfig::Filesystem { root: root.clone() },
        (None, BackendConfig::Memory) => {
            config.backend = BackendConfig::Filesystem { root: PathBuf::from(DEFAULT_ROOT) }
        }
        (None, BackendConfig::Filesystem { .. }) => {}
    }
    Ok(config)
}

async fn read_inputs(files: &[PathBuf]) -> anyhow::Result<Vec<(String, Vec<u8>)>> {
    if files.is_empty() {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        return Ok(vec![("-".to_string(), data)]);
    }
    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        inputs.push((path.display().to_string(), data));
    }
    Ok(inputs)
}

async fn cmd_put(store: &Blockstore, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let inputs = read_inputs(&args.files).await?;
    let (names, data): (Vec<String>, Vec<Vec<u8>>) = inputs.into_iter().unzip();
    let payloads = stream::iter(data.into_iter().map(BlockPayload::from));
    let receipts: Vec<_> = store.put_payload_stream(payloads, args.ext).try_collect().await?;

    for (name, receipt) in names.iter().zip(&receipts) {
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({ "file": name, "key": receipt.key.to_string(), "outcome": receipt.outcome })
            ),
            OutputFormat::Text => {
                let mark = match receipt.outcome {
                    WriteOutcome::Written => "✓".green(),
                    WriteOutcome::Skipped => "=".dimmed(),
                };
                println!("{} {}  {}", mark, receipt.key.to_string().cyan(), name);
            }
        }
    }
    Ok(())
}

async fn cmd_get(store: &Blockstore, args: GetArgs) -> anyhow::Result<()> {
    let block = store.get(args.key.as_str(), args.ext.as_deref()).await?;
    match &args.output {
        Some(path) => write_file(path, block.data()).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(block.data()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("writing {}", path.display()))
}

async fn cmd_has(store: &Blockstore, args: KeysArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut missing = 0usize;
    for key in &args.keys {
        let present = store.has(key.as_str(), args.ext.as_deref()).await?;
        if !present {
            missing += 1;
        }
        match format {
            OutputFormat::Json => println!("{}", json!({ "key": key, "present": present })),
            OutputFormat::Text if present => println!("{} {}", "✓".green(), key),
            OutputFormat::Text => println!("{} {}", "✗".red(), key),
        }
    }
    if missing > 0 {
        anyhow::bail!("{missing} of {} blocks not stored", args.keys.len());
    }
    Ok(())
}

async fn cmd_rm(store: &Blockstore, args: KeysArgs, format: OutputFormat) -> anyhow::Result<()> {
    for key in &args.keys {
        store.delete(key.as_str(), args.ext.as_deref()).await?;
        match format {
            OutputFormat::Json => println!("{}", json!({ "key": key, "removed": true })),
            OutputFormat::Text => println!("{} Removed {}", "✓".green(), key),
        }
    }
    Ok(())
}

async fn cmd_ls(store: &Blockstore, args: LsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut keys = Box::pin(store.keys());
    let mut count = 0usize;
    while let Some(key) = keys.next().await {
        let key = key?;
        count += 1;
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({ "key": key.to_string(), "hex": key.digest().to_hex() })
            ),
            OutputFormat::Text if args.hex => println!("{}  {}", key, key.digest().to_hex().dimmed()),
            OutputFormat::Text => println!("{key}"),
        }
    }
    if count == 0 && matches!(format, OutputFormat::Text) {
        eprintln!("No blocks.");
    }
    Ok(())
}

async fn cmd_key(codec: &KeyCodec, args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let extension = args.ext.unwrap_or_else(|| codec.default_extension().clone());
    for (name, data) in read_inputs(&args.files).await? {
        let digest = codec.derive_key(&data);
        let key = codec.to_storage_key(&digest, &extension).to_string();
        match format {
            OutputFormat::Json => {
                println!("{}", json!({ "file": name, "key": key, "hex": digest.to_hex() }))
            }
            OutputFormat::Text => println!("{}  {}", key.cyan(), name),
        }
    }
    Ok(())
}

// Forbid unwrap() in production code so corrupt input cannot panic the tool.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use datatree::workbook;
use datatree::{DataTree, TreeFactory};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build, inspect and verify data tree files.
#[derive(Parser, Debug)]
#[command(name = "datatree")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a JSON workbook, validate its references and save the tree.
    Build {
        workbook: PathBuf,
        out: PathBuf,
        /// Fail instead of warning when a reference does not resolve.
        #[arg(long)]
        strict_refs: bool,
    },
    /// Load a tree file and print it.
    Dump { file: PathBuf },
    /// Load a tree file and report whether it is intact.
    Verify { file: PathBuf },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "datatree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let factory = match TreeFactory::from_env() {
        Ok(factory) => factory,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    tracing::debug!("configuration: {:?}", factory.config());

    let result = match cli.command {
        Command::Build {
            workbook,
            out,
            strict_refs,
        } => build(&factory, &workbook, &out, strict_refs),
        Command::Dump { file } => load(&factory, &file).map(|tree| print!("{tree}")),
        Command::Verify { file } => verify(&factory, &file),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn build(factory: &TreeFactory, source: &Path, out: &Path, strict_refs: bool) -> CliResult {
    let text = std::fs::read_to_string(source)?;
    let book = workbook::parse_workbook(&text)?;
    let import = workbook::import(factory, &book)?;

    if !import.dangling.is_empty() {
        tracing::warn!("{} references did not resolve", import.dangling.len());
        if strict_refs {
            return Err(format!("{} dangling references", import.dangling.len()).into());
        }
    }

    import.tree.save(out)?;
    tracing::info!(
        "wrote {} saplings from {} sheets to {}",
        import.tree.node_count(),
        book.sheets.len(),
        out.display()
    );
    Ok(())
}

fn load(factory: &TreeFactory, file: &Path) -> Result<DataTree, Box<dyn std::error::Error>> {
    Ok(factory.load(file)?)
}

fn verify(factory: &TreeFactory, file: &Path) -> CliResult {
    let tree = load(factory, file)?;
    println!(
        "{}: ok, checksum valid, {} saplings",
        file.display(),
        tree.node_count()
    );
    Ok(())
}

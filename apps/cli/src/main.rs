//! sq2cql - Structured Query to CQL
//!
//! Reads a Structured Query together with the mapping files it is translated against and
//! prints the resulting CQL library to stdout.

mod config;
mod logging;

use anyhow::Context;
use clap::Parser;
use sq2cql::{json, MappingContext, Translator};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::Settings;

#[derive(Debug, Parser)]
#[command(name = "sq2cql", version, about = "Translates a Structured Query into a CQL library")]
struct Args {
    /// Structured Query JSON file, `-` reads from stdin
    query: PathBuf,

    /// Term code mappings (JSON array)
    #[arg(long, short)]
    mappings: PathBuf,

    /// Concept tree used to expand criteria (JSON)
    #[arg(long, short)]
    tree: Option<PathBuf>,

    /// Code system URL to alias map (JSON object)
    #[arg(long = "code-systems", short = 'c')]
    code_systems: PathBuf,

    /// Settings file, defaults to `sq2cql.toml` if present
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print only the Patient context of the library
    #[arg(long)]
    patient_context_only: bool,
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    logging::init_logging(&settings.logging).context("Failed to initialize logging")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        query = %args.query.display(),
        "Starting sq2cql"
    );

    let mut builder = MappingContext::builder()
        .mappings(
            json::parse_mappings(&read_file(&args.mappings)?)
                .with_context(|| format!("Failed to parse mappings {}", args.mappings.display()))?,
        )
        .code_system_aliases(
            json::parse_code_system_aliases(&read_file(&args.code_systems)?).with_context(|| {
                format!("Failed to parse code systems {}", args.code_systems.display())
            })?,
        );
    if let Some(tree) = &args.tree {
        builder = builder.tree(
            json::parse_mapping_tree(&read_file(tree)?)
                .with_context(|| format!("Failed to parse concept tree {}", tree.display()))?,
        );
    }

    let query = json::parse_structured_query(&read_query(&args.query)?)
        .context("Failed to parse structured query")?;
    let library = Translator::new(builder.build())
        .with_header(settings.library)
        .to_cql(&query)
        .context("Failed to translate structured query")?;

    if args.patient_context_only {
        print!("{}", library.print_patient_context());
    } else {
        print!("{}", library.print());
    }
    Ok(())
}

fn read_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_query(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read structured query from stdin")?;
        Ok(input)
    } else {
        read_file(path)
    }
}

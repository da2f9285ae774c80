use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use partialx::parser::{blocks, resources};
use partialx::{config, extract, store, Options};

#[derive(Parser)]
#[command(name = "partialx", about = "Extract comment-delimited partials from HTML documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract partials from documents and write the inventory
    Extract(ExtractArgs),
    /// List the regions found in one document
    Scan {
        file: PathBuf,
    },
    /// Print the page resources of one document as JSON
    Resources {
        file: PathBuf,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// Documents or glob patterns, processed in the order given
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Config file (default: ./partialx.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for individual partial files
    #[arg(long)]
    partials: Option<PathBuf>,

    /// Extension of partial files
    #[arg(long)]
    ext: Option<String>,

    /// Path of the JSON inventory
    #[arg(long, conflicts_with = "no_storage")]
    storage: Option<PathBuf>,

    /// Do not write the JSON inventory
    #[arg(long)]
    no_storage: bool,

    /// Write each unique partial to its own file
    #[arg(long)]
    store_partials: bool,

    /// Indent used inside the template wrapper
    #[arg(long)]
    indent: Option<String>,

    /// Reject documents with unbalanced markers
    #[arg(long)]
    strict: bool,

    /// Print the inventory JSON to stdout
    #[arg(long)]
    print: bool,
}

impl ExtractArgs {
    fn options(&self) -> Result<Options> {
        let mut options = config::load(self.config.as_deref()).context("Failed to load configuration")?;
        if let Some(p) = &self.partials {
            options.partials = p.clone();
        }
        if let Some(ext) = &self.ext {
            options.ext = ext.clone();
        }
        if let Some(s) = &self.storage {
            options.storage = Some(s.clone());
        }
        if self.no_storage {
            options.storage = None;
        }
        if let Some(indent) = &self.indent {
            options.indent = indent.clone();
        }
        options.store_partials |= self.store_partials;
        options.strict |= self.strict;
        Ok(options)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract(args) => run_extract(&args),
        Commands::Scan { file } => {
            let text = read(&file)?;
            let scan = blocks::scan(&text);
            if scan.blocks.is_empty() {
                println!("No regions in {}", file.display());
            }
            for (i, block) in scan.blocks.iter().enumerate() {
                let first = block.lines().next().unwrap_or_default();
                println!("{:>3} | {:>4} lines | {}", i + 1, block.lines().count(), truncate(first.trim(), 70));
            }
            for issue in &scan.issues {
                println!("warning: {}", issue);
            }
            Ok(())
        }
        Commands::Resources { file } => {
            let text = read(&file)?;
            println!("{}", serde_json::to_string_pretty(&resources::extract(&text))?);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run_extract(args: &ExtractArgs) -> Result<()> {
    let options = args.options()?;
    let documents = expand_inputs(&args.inputs)?;
    if documents.is_empty() {
        bail!("No documents match {:?}", args.inputs);
    }

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let inventory = extract::run_with_progress(&documents, &options, |n| pb.inc(n as u64));
    pb.finish_and_clear();
    let inventory = inventory?;

    println!(
        "Extracted {} blocks ({} unique) from {} documents",
        inventory.length_total,
        inventory.length_unique,
        documents.len()
    );
    for w in &inventory.warnings {
        let status = if w.rejected { "rejected" } else { "warning" };
        println!("  {} {}: {}", status, w.origin, w.message);
    }

    if args.print {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    }

    // extraction results are already reported; a write failure only changes the exit code
    match store::persist(&inventory, &options) {
        Ok(done) => {
            if done.partials > 0 {
                println!("Stored {} partials in {}", done.partials, options.partials.display());
            }
            if let Some(path) = done.report {
                println!("Inventory written to {}", path.display());
            }
            Ok(())
        }
        Err(e) => Err(e).context("Failed to persist inventory"),
    }
}

/// Literal paths pass through untouched; patterns expand in glob order.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for input in inputs {
        if !input.contains(['*', '?', '[']) {
            documents.push(PathBuf::from(input));
            continue;
        }
        let matches: Vec<PathBuf> = glob::glob(input)
            .with_context(|| format!("Invalid glob pattern: {}", input))?
            .filter_map(|entry| entry.map_err(|e| warn!("Skipping {}", e)).ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            warn!("No files match {}", input);
        }
        documents.extend(matches);
    }
    Ok(documents)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

//! gritflow: streaming dataflow transforms for genomic records
//!
//! Usage: gritflow <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gritflow::datum::Datum;
use gritflow::error::{FlowError, Result};
use gritflow::expr::ExpressionEngine;
use gritflow::flow::{InlineSource, Pipeline};
use gritflow::params::{PipelineSpec, TRANSFORM_TYPES};

#[derive(Parser)]
#[command(name = "gritflow")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "gritflow: streaming dataflow transforms for genomic records", long_about = None)]
struct Cli {
    /// Validate that sweep-line transforms (coverage) receive input sorted
    /// by chromosome and start, failing on the first out-of-order record.
    #[arg(long, global = true)]
    strict_order: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run newline-delimited JSON records through a pipeline
    Run {
        /// Pipeline spec (.json or .toml)
        #[arg(short, long)]
        pipeline: PathBuf,

        /// Input records, one JSON object per line (use - for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Partition the input into facets by these fields
        #[arg(short, long = "facet-by")]
        facet_by: Vec<String>,
    },

    /// Build a pipeline and print its node tree
    Describe {
        /// Pipeline spec (.json or .toml)
        #[arg(short, long)]
        pipeline: PathBuf,
    },

    /// List the supported transform types
    Transforms,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gritflow=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    // Must be set before the pipeline is built
    if cli.strict_order {
        gritflow::config::set_strict_order(true);
    }

    let result = match cli.command {
        Commands::Run {
            pipeline,
            input,
            facet_by,
        } => run_pipeline(&pipeline, input, facet_by),
        Commands::Describe { pipeline } => run_describe(&pipeline),
        Commands::Transforms => run_transforms(),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build(path: &Path) -> Result<Pipeline> {
    let spec = PipelineSpec::from_path(path)?;
    Pipeline::build(&spec, &ExpressionEngine::new())
}

fn read_records<R: BufRead>(reader: R) -> Result<Vec<Datum>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let datum: Datum = serde_json::from_str(line).map_err(|e| {
            FlowError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {}: {}", i + 1, e),
            ))
        })?;
        records.push(datum);
    }
    Ok(records)
}

fn run_pipeline(path: &Path, input: Option<PathBuf>, facet_by: Vec<String>) -> Result<()> {
    let mut pipeline = build(path)?;

    let (records, url) = match input {
        Some(p) if p.to_string_lossy() != "-" => {
            let file = File::open(&p)?;
            (
                read_records(BufReader::new(file))?,
                Some(p.display().to_string()),
            )
        }
        _ => (read_records(io::stdin().lock())?, None),
    };

    tracing::info!("Read {} records", records.len());

    let mut source = InlineSource::new(records);
    if let Some(url) = url {
        source = source.with_url(url);
    }
    if !facet_by.is_empty() {
        source = source.with_facet_by(&facet_by);
    }

    pipeline.run(source)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut written = 0usize;
    for datum in pipeline.collector()?.get_data()? {
        serde_json::to_writer(&mut out, datum)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;

    tracing::info!("Wrote {} records", written);
    Ok(())
}

fn run_describe(path: &Path) -> Result<()> {
    let pipeline = build(path)?;
    print!("{}", pipeline.describe());
    Ok(())
}

fn run_transforms() -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for t in TRANSFORM_TYPES {
        writeln!(out, "{}", t)?;
    }
    writeln!(out, "gather (alias of regexFold)")?;
    Ok(())
}

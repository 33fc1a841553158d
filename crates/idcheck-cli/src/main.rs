use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idcheck_core::ocr::TesseractOcr;
use idcheck_core::Thresholds;
use tracing_subscriber::EnvFilter;

mod inspect;
mod status;

#[derive(Parser)]
#[command(name = "idcheck", version, about = "Selfie and identity document checks")]
struct Cli {
    /// TOML file overriding the built-in thresholds
    #[arg(long, global = true)]
    thresholds: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure lighting and run the liveness heuristic on a selfie
    Photo { path: PathBuf },
    /// OCR an identity document and score its validity
    Document {
        path: PathBuf,
        /// Tesseract trained-data language
        #[arg(long, default_value = "por")]
        lang: String,
        /// Path or name of the tesseract binary
        #[arg(long, default_value = "tesseract")]
        tesseract: PathBuf,
        #[arg(long, env = "TESSDATA_PREFIX")]
        tessdata_dir: Option<PathBuf>,
    },
    /// Query a running idcheckd
    Status {
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let thresholds = match &cli.thresholds {
        Some(path) => Thresholds::load(path)
            .with_context(|| format!("failed to load thresholds from {}", path.display()))?,
        None => Thresholds::default(),
    };

    match cli.command {
        Command::Photo { path } => inspect::photo(&path, &thresholds),
        Command::Document {
            path,
            lang,
            tesseract,
            tessdata_dir,
        } => {
            let ocr = TesseractOcr::new(tesseract, lang).with_tessdata_dir(tessdata_dir);
            inspect::document(&path, &ocr, &thresholds)
        }
        Command::Status { url } => status::run(&url),
    }
}

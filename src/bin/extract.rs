// Run the extraction pipeline over a single PDF from the command line
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use recibo::config;
use recibo::extraction::{ExtractionPipeline, OcrEngine};

#[derive(Parser)]
#[command(name = "recibo-extract", about = "Extract structured data from a receipt PDF")]
struct Args {
    /// Receipt PDF to process
    pdf: PathBuf,

    /// Print the record as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Directory holding the OCR recognition model and charset
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let model_dir = args.model_dir.unwrap_or_else(config::model_dir);
    let ocr = Arc::new(Mutex::new(OcrEngine::new(model_dir)));
    let pipeline = ExtractionPipeline::new(ocr);

    let record = pipeline.extract(&args.pdf)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    println!("merchant: {}", record.merchant.as_deref().unwrap_or("-"));
    println!(
        "date:     {}",
        record
            .timestamp
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "total:    {}",
        record
            .total_amount
            .map(|t| format!("{t:.2}"))
            .unwrap_or_else(|| "-".to_string())
    );
    println!("items:    {}", record.items.len());
    for item in &record.items {
        println!(
            "  {} x{} @ {:.2} = {:.2}",
            item.name, item.quantity, item.unit_price, item.total_price
        );
    }

    Ok(())
}

// recibo-server - receipt OCR service over HTTP
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recibo::api::{self, AppState};
use recibo::config;
use recibo::extraction::{ExtractionPipeline, OcrEngine};
use recibo::storage::ReceiptStore;

#[derive(Parser)]
#[command(name = "recibo-server", about = "Grocery receipt extraction service")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// SQLite database file
    #[arg(long, default_value = "recibo.db")]
    database: PathBuf,

    /// Directory holding the OCR recognition model and charset
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let store = ReceiptStore::open(&args.database)?;
    info!(database = %args.database.display(), "store ready");

    // One OCR engine for the whole process; model loading happens on the
    // first scanned upload, not here.
    let model_dir = args.model_dir.unwrap_or_else(config::model_dir);
    let ocr = Arc::new(Mutex::new(OcrEngine::new(model_dir)));
    let pipeline = Arc::new(ExtractionPipeline::new(ocr));

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        pipeline,
    };

    let addr = format!("{}:{}", args.host, args.port);
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}

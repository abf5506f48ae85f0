//! Spectral index ETL.
//!
//! Reads parcel boundaries from a CSV file, searches Sentinel-2 L2A scenes
//! for each parcel over a date range, computes NDVI/NDMI rasters and loads
//! them with the parcel into PostGIS.

mod config;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::EtlConfig;
use etl_common::DateRange;
use ingestion::{read_parcels, BatchReport, ParcelOutcome, PipelineDriver};
use raster::CogAssetReader;
use scene_catalog::{StacCatalog, StacCatalogClient};
use storage::PgProductStore;

#[derive(Parser, Debug)]
#[command(name = "spectral-etl")]
#[command(about = "Generate spectral indices from Sentinel-2 images and load them into a database")]
struct Args {
    /// CSV file with a parcel identifier column and a WKT polygon column
    #[arg(short = 'f', long)]
    input_file: PathBuf,

    /// First acquisition date to search (YYYY-MM-DD)
    #[arg(short = 's', long)]
    start_date: NaiveDate,

    /// Last acquisition date to search (YYYY-MM-DD)
    #[arg(short = 'e', long)]
    end_date: NaiveDate,

    /// Search images and compute indices without loading anything
    #[arg(long)]
    not_load: bool,

    /// Configuration file path (defaults to environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting spectral ETL");

    // Load configuration
    let config = match &args.config {
        Some(path) => EtlConfig::from_yaml(path)?,
        None => EtlConfig::from_env()?,
    };
    info!(
        catalog = %config.stac_api_url,
        collection = %config.pipeline.collection,
        indices = ?config.pipeline.indices,
        "Loaded configuration"
    );

    let range = DateRange::new(args.start_date, args.end_date)?;
    let parcels = read_parcels(&args.input_file, &config.pipeline.columns())?;

    let catalog = StacCatalogClient::new(
        StacCatalog::from_str_or_url(&config.stac_api_url),
        config.client_options(),
    )?;
    let reader = CogAssetReader::new(config.request_timeout())?
        .with_retries(config.max_retries, config.client_options().initial_backoff);
    let driver = PipelineDriver::new(&catalog, &reader, config.pipeline.clone());

    let report = if args.not_load {
        driver.run(&parcels, &range, None).await?
    } else {
        let srid = i32::try_from(config.pipeline.target_crs.epsg())?;
        let store = PgProductStore::connect(&config.database_url(), config.pool_settings(), srid).await?;
        store.migrate().await?;

        let result = driver.run(&parcels, &range, Some(&store)).await;
        store.close().await;
        result?
    };

    log_report(&report);
    Ok(())
}

fn log_report(report: &BatchReport) {
    for parcel in &report.parcels {
        if let ParcelOutcome::Failed { stage, error } = &parcel.outcome {
            warn!(parcel = %parcel.parcel_id, stage = %stage, error = %error, "Parcel not loaded");
        }
    }
    info!(
        parcels = report.parcels.len(),
        succeeded = report.succeeded(),
        rows_loaded = report.rows_loaded(),
        optimized = report.optimized,
        "Spectral ETL completed"
    );
}

use anyhow::{Context, Result};
use catalog2parquet::{init_storage, init_tracing, Cli, ConversionJob, StorageJobContext};
use catalog2parquet_config::RuntimeConfig;
use catalog2parquet_core::StoredCatalog;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build tokio runtime and run the job
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Step 1: Load configuration (file, then env overrides, validated)
    let mut config = if let Some(config_path) = &cli.config {
        RuntimeConfig::load_from_path(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        RuntimeConfig::load().context("Failed to load configuration")?
    };

    // Step 2: CLI overrides (highest priority)
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }

    init_tracing(&config.log);
    for warning in config.warnings() {
        warn!("{}", warning);
    }
    info!(
        "catalog2parquet v{} converting {}.{}",
        env!("CARGO_PKG_VERSION"),
        config.source.database,
        config.source.table
    );

    // Step 3: Wire storage, catalog and job context
    let operator = init_storage(&config)?;
    let catalog = Arc::new(StoredCatalog::new(
        operator.clone(),
        config.source.manifest.clone(),
    ));
    let context = StorageJobContext::new(
        cli.job_arguments(),
        operator.clone(),
        config.job.state_prefix.clone(),
    );

    // Step 4: Run once; errors exit non-zero
    let job = ConversionJob::from_config(catalog, operator, &config)?;
    let summary = job.run(&context).await?;

    info!(
        "Run {} of '{}' finished: {} rows, {} files",
        summary.run.run_id,
        summary.run.job_name,
        summary.rows,
        summary.files.len()
    );
    Ok(())
}

use std::{sync::Arc, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use tracing_subscriber::EnvFilter;

use pet_seg_rs::{
    http::{self, HttpState},
    load_segmenter, ArtifactStore, BatchConfig, Cli, Command, ImageProcessor, ModelConfig,
    ServeConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(serve) => run_server(cli.model, serve).await,
        Command::Batch(batch) => {
            tokio::task::spawn_blocking(move || run_batch(&cli.model, batch)).await?
        }
    }
}

async fn run_server(model: ModelConfig, config: ServeConfig) -> Result<()> {
    let segmenter = tokio::task::spawn_blocking(move || load_segmenter(&model)).await??;
    let artifacts = Arc::new(ArtifactStore::new(&config.artifact_dir, config.artifact_max_age())?);

    let sweeper = Arc::clone(&artifacts);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweeper.max_age().max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            match sweeper.sweep() {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "expired artifacts removed"),
                Err(e) => tracing::warn!(error = %e, "artifact sweep failed"),
            }
        }
    });

    let state = HttpState {
        segmenter: Arc::new(segmenter),
        artifacts,
        public_url: config.public_url.clone(),
        default_alpha: config.default_alpha,
    };
    let app = http::router(state, config.body_limit_bytes);

    let addr = config.bind_addr();
    tracing::info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

fn run_batch(model: &ModelConfig, config: BatchConfig) -> Result<()> {
    ensure!(model.model_path.exists(), "Model path does not exist");
    ensure!(config.input_dir.exists(), "Input directory does not exist");

    ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build_global()?;

    let segmenter = load_segmenter(&ModelConfig {
        require_model: true,
        ..model.clone()
    })?;
    let summary = ImageProcessor::new(segmenter, config).process_directory()?;
    ensure!(summary.failed == 0, "{} of {} images failed", summary.failed, summary.processed + summary.failed);
    Ok(())
}

use std::sync::Arc;

use anime_convert::api::{ApiServer, AppState};
use anime_convert::config::AppConfig;
use anime_convert::logging::init_logging;
use anime_convert::pipeline::{
    Dispatcher, JobPurgeService, JobStore, Pipeline, PipelineRunner, StageInvoker,
};
use anime_convert::utils::fs;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;

    let (logging_config, _log_guard) = init_logging(&config.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        filter = %logging_config.get_filter(),
        "Starting anime-convert"
    );

    fs::ensure_dir_all_with_op("creating uploads directory", &config.dispatcher.uploads_dir)
        .await?;
    fs::ensure_dir_all_with_op("creating results directory", &config.results_dir).await?;

    let invoker = Arc::new(match &config.interpreter {
        Some(interpreter) => StageInvoker::with_interpreter(interpreter.clone()),
        None => StageInvoker::new(),
    });
    info!(
        scripts_dir = %config.scripts_dir.display(),
        interpreter = ?invoker.interpreter(),
        "Loading pipeline"
    );
    let pipeline = Pipeline::from_scripts(&config.scripts_dir, invoker);
    info!(stages = ?pipeline, "Pipeline ready");

    let store = Arc::new(JobStore::new());
    let runner = Arc::new(PipelineRunner::new(
        Arc::clone(&store),
        pipeline,
        config.results_dir.clone(),
        config.fps,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        config.dispatcher.clone(),
        Arc::clone(&store),
        runner,
    ));

    let server = ApiServer::new(
        config.server.clone(),
        AppState::new(dispatcher, config.results_dir.clone()),
    );
    let cancel_token = server.cancel_token();

    logging_config.start_retention_cleanup(cancel_token.clone());
    Arc::new(JobPurgeService::new(
        config.purge.clone(),
        store,
        config.results_dir.clone(),
        config.dispatcher.uploads_dir.clone(),
    ))
    .start(cancel_token.clone());

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                shutdown_token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    server.run().await?;

    info!("anime-convert stopped");
    Ok(())
}

#![warn(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

mod app;
mod cli;
mod config;
mod devices;
mod error;
mod http;
mod ping;
mod retention;

use cli::Cli;
use config::Config;
use http::AppState;
use logger::init_tracing;
use retention::{RetentionCleanup, RetentionPolicy};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::from_config(cli.config.as_ref())?;
    if let Some(bind) = cli.bind {
        config.http.bind = bind;
    }
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let orchestrator = Arc::new(app::build_orchestrator(&config)?);
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };

    let cleanup = RetentionPolicy::from_config(&config.retention).map(|policy| {
        info!(keep_minutes = policy.keep_minutes, "bucket retention enabled");
        RetentionCleanup::new(Arc::clone(orchestrator.store()), policy).start_periodic_cleanup()
    });

    let served =
        http::run_server(&config.http.bind, config.http.port, AppState::new(Arc::clone(&orchestrator))).await;

    info!("shutting down workers");
    orchestrator.stop_all();
    if let Some(cleanup) = cleanup {
        cleanup.abort();
    }

    match runner.await {
        Ok(Ok(report)) => {
            for (worker, outcome) in report {
                match outcome {
                    Ok(summary) => info!(%worker, cycles = summary.cycles, failed = summary.failed, "worker finished"),
                    Err(e) => warn!(%worker, error = %e, "worker ended with an error"),
                }
            }
        }
        Ok(Err(e)) => error!(error = %e, "workers never started"),
        Err(e) => error!(error = %e, "worker task panicked"),
    }

    served?;
    Ok(())
}

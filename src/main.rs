use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use media_stash::config::{Config, CONFIG_FILE};
use media_stash::storage::sweep_old_files;
use media_stash::{Dispatcher, DownloadResult};

const MIN_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    // Results go to stdout, logs to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::get_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Error reading {}: {}", CONFIG_FILE, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.download_dir)
        .await
        .with_context(|| format!("could not create {}", config.download_dir.display()))?;

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .context("could not build HTTP client")?;
    let dispatcher = Arc::new(Dispatcher::new(client, &config));

    spawn_sweeper(&config);

    let mut sigterm = signal(SignalKind::terminate()).context("Error creating SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Error creating SIGINT handler")?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut requests = JoinSet::new();

    info!(download_dir = %config.download_dir.display(), "reading URLs from stdin");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("could not read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let dispatcher = dispatcher.clone();
                requests.spawn(async move {
                    let result = dispatcher.handle(&line).await;
                    print_result(&result);
                });
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, exiting");
                requests.shutdown().await;
                return Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, exiting");
                requests.shutdown().await;
                return Ok(());
            }
        }
    }

    // stdin closed, let in-flight requests finish
    while requests.join_next().await.is_some() {}
    Ok(())
}

fn print_result(result: &DownloadResult) {
    match serde_json::to_string(result) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "could not serialize result"),
    }
}

/// Periodically delete stale files from the download directory, starting right away
fn spawn_sweeper(config: &Config) {
    let dir = config.download_dir.clone();
    let max_age = config.cleanup_max_age();
    let period = config.cleanup_interval().max(MIN_CLEANUP_INTERVAL);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match sweep_old_files(&dir, max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "swept download directory"),
                Err(e) => warn!(error = %e, "could not sweep download directory"),
            }
        }
    });
}

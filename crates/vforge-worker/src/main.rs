//! Media job worker binary.
//!
//! Reads one JSON job from the file named by the first argument, or from
//! stdin when the argument is absent or `-`, and prints the job output as
//! JSON on stdout.

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vforge_media::detect_gpu;
use vforge_worker::{metrics, server, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vforge=info".parse().unwrap())
        .add_directive("aws_config=warn".parse().unwrap());

    // Logs go to stderr; stdout carries the job output.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Worker error: {:#}", e);
            let output = serde_json::json!({ "success": false, "error": format!("{:#}", e) });
            println!("{}", output);
            std::process::exit(1);
        }
    }
}

/// Run the job; `Ok(false)` when the job itself failed.
async fn run() -> anyhow::Result<bool> {
    info!("Starting vforge-worker");

    let metrics_handle = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    };

    let config = WorkerConfig::from_env();
    config
        .ensure_dirs()
        .with_context(|| format!("creating directories under {}", config.work_root.display()))?;
    info!("Worker config: {:?}", config);

    let gpu_available = !config.disable_gpu && detect_gpu().await;

    let server = config.serve_output.then(|| {
        let config = config.clone();
        let handle = metrics_handle.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve(config, handle).await {
                error!("Output server failed: {}", e);
            }
        })
    });

    let input = read_job(std::env::args().nth(1)).await?;
    let executor = JobExecutor::new(config, gpu_available);
    let output = executor.execute_json(&input).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("serializing job output")?
    );

    if let Some(server) = server {
        info!("Job done, serving outputs until interrupted");
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        server.abort();
    }

    Ok(output.success)
}

async fn read_job(source: Option<String>) -> anyhow::Result<String> {
    match source.as_deref() {
        None | Some("-") => {
            let mut input = String::new();
            tokio::io::stdin()
                .read_to_string(&mut input)
                .await
                .context("reading job from stdin")?;
            Ok(input)
        }
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading job file {}", path)),
    }
}

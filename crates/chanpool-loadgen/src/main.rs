#![doc = include_str!("../README.md")]

mod config;
mod driver;
mod telemetry;

use chanpool_tonic::TopicTransport;
use clap::Parser;
use config::{CliArgs, LoadgenConfig};
use std::sync::Arc;
use telemetry::init_telemetry;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = LoadgenConfig::try_from(args)?;

    let providers = init_telemetry()?;
    log_startup_info(&config);

    let transport = Arc::new(TopicTransport::connect(
        &config.credentials,
        &config.transport,
        config.strategy,
    )?);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let report = driver::run(Arc::clone(&transport), &config, cancel).await;
    transport.close();

    if config.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_table();
    }

    #[cfg(feature = "tracing")]
    tracing::info!("load run finished");
    providers.shutdown();
    Ok(())
}

fn log_startup_info(_config: &LoadgenConfig) {
    #[cfg(feature = "tracing")]
    tracing::info!(
        subscribers = _config.subscribers,
        stream_capacity = _config.stream_capacity(),
        strategy = ?_config.strategy,
        hold = ?_config.hold,
        "starting load run"
    );
    #[cfg(feature = "tracing")]
    tracing::debug!("full config: {_config:#?}");
}

async fn shutdown_signal(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::info!("ctrl-c received, cancelling subscribers");
            cancel.cancel();
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("failed to listen for ctrl-c: {_e}");
        }
    }
}

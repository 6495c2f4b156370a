use clap::Parser;
use enki_server::server::{
    app,
    config::{AppConfig, CliArgs},
    metrics,
    service::{GreeterService, chain, logging::logging, templates::StaticTemplates},
    signal::ShutdownTrigger,
    telemetry::init_telemetry,
};
use std::process::ExitCode;
use std::sync::Arc;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Exit status for configuration that cannot be decoded or validated.
const EXIT_INVALID_CONFIG: u8 = 2;

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() -> ExitCode {
    // Load from .env
    let _ = dotenvy::dotenv();
    // Exits with 0 for --help/--version and 2 for malformed flags.
    let args = CliArgs::parse();
    let config = match AppConfig::try_from(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(EXIT_INVALID_CONFIG);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let providers = init_telemetry(config.log_level)?;
    log_startup_info(&config);

    let prometheus = metrics::install_recorder()?;
    let greeter = chain(
        Arc::new(GreeterService::new(StaticTemplates::default())),
        vec![logging()],
    );

    let app = app::build(&config, greeter, Some(prometheus.clone())).await?;
    let trigger = ShutdownTrigger::try_new(app.orchestrator.shutdown_token())?;
    let upkeep = metrics::spawn_upkeep(prometheus, app.orchestrator.shutdown_token());

    let result = app.orchestrator.run().await;
    trigger.recv().await;
    let _ = upkeep.await;

    if let Ok(report) = &result {
        for (server, outcome) in &report.outcomes {
            tracing::info!(server, %outcome, "server finished");
        }
        tracing::info!("exiting");
    }
    providers.shutdown();
    result.map(|_| ()).map_err(Into::into)
}

fn log_startup_info(config: &AppConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting enki-server with full config: {:#?}", config);
    } else {
        tracing::info!(
            grpc = ?config.grpc.addr,
            http = ?config.http.addr,
            "Starting enki-server"
        );
    }
}

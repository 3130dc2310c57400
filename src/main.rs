#![forbid(unsafe_code)]
#![recursion_limit = "256"]

#[cfg(test)]
#[macro_use]
mod testutil;

mod service;

use anyhow::{bail, Context, Result};
use autometrics::prometheus_exporter;
use axum::Server;
use clap::Parser;
use opentelemetry::sdk::{trace, Resource};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use service::{
    BusinessRoutesConfig, ChartServiceConfig, PrometheusServiceConfig, Service,
    StorageServiceConfig,
};
use std::io;
use std::net::IpAddr;
use std::process::ExitCode;
use tokio::select;
use tracing::{error, info};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use url::Url;

/// Renders charts of the expressions behind Alertmanager alerts.
#[derive(Parser)]
#[clap(
    name = "alert-snapshot",
    author = "Team Fiberplane",
    version = clap::crate_version!()
)]
struct CliArguments {
    /// Log using JSON.
    #[clap(long, env = "LOG_JSON")]
    json: bool,

    /// Enable tracing support.
    ///
    /// Use `--otlp-endpoint` to specify where the traces should be sent.
    #[clap(long, env)]
    tracing: bool,

    /// Endpoint of the OTLP collector.
    #[clap(long, env, default_value = "http://localhost:4317")]
    otlp_endpoint: Url,

    #[clap(flatten)]
    serve_args: ServeArguments,
}

#[derive(Parser)]
struct ServeArguments {
    /// Server port number
    #[clap(long, short, env, default_value = "3031")]
    port: u16,

    /// Hostname to listen on
    #[clap(long, short = 'H', env, default_value = "127.0.0.1")]
    listen_host: IpAddr,

    #[clap(flatten)]
    chart_config: ChartServiceConfig,

    #[clap(flatten)]
    prometheus_config: PrometheusServiceConfig,

    #[clap(flatten)]
    routes_config: BusinessRoutesConfig,

    #[clap(flatten)]
    storage_config: StorageServiceConfig,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    // Do not use try_parse here.
    // try_parse will fail if we pass --version flag, as it will not contain
    // any subcommand.
    let args = CliArguments::parse();

    let result = initialize_logger(&args);
    if let Err(err) = result {
        error!(%err, "Unable to initialize logger");
        return ExitCode::FAILURE;
    }

    if let Err(err) = prometheus_exporter::try_init() {
        error!(?err, "Failed to initialize Prometheus exporter");
        return ExitCode::FAILURE;
    };

    let result = handle_serve(args.serve_args).await;

    if let Err(err) = result {
        error!(%err, "Command executed unsuccessfully");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn initialize_logger(args: &CliArguments) -> Result<()> {
    // The filter layer controls which log levels to display.
    let filter_layer = EnvFilter::from_default_env();

    // The log layer controls the output of log events to stderr. Depending on the
    // `json` flag, it will either be human readable or json encoded.
    let log_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let log_layer = if args.json {
        log_layer.json().boxed()
    } else {
        log_layer.boxed()
    };

    // The trace layer will send traces to the configured tracing backend
    // depending on the `tracing` flag.
    let trace_layer = if args.tracing {
        // This tracer is responsible for sending the actual traces.
        let tracer =
            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(args.otlp_endpoint.to_string()),
                )
                .with_trace_config(trace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", "alert-snapshot"),
                ])))
                .install_batch(opentelemetry::runtime::Tokio)
                .context("unable to install tracer")?;

        // This layer will take the traces from the `tracing` crate and send
        // them to the tracer specified above.
        Some(OpenTelemetryLayer::new(tracer))
    } else {
        None
    };

    Registry::default()
        .with(filter_layer)
        .with(log_layer)
        .with(trace_layer)
        .try_init()
        .context("unable to initialize logger")?;

    Ok(())
}

async fn handle_serve(args: ServeArguments) -> Result<()> {
    let commit = option_env!("GITHUB_SHA").unwrap_or("unknown");

    let service = Service::from_config(
        args.chart_config,
        args.prometheus_config,
        args.routes_config,
        args.storage_config,
    )
    .await?;

    info!(
        port = ?args.port,
        listen_host = ?args.listen_host,
        ?commit,
        "Starting server"
    );

    let app = service::router::create_router(service);

    let (shutdown_trigger, mut shutdown_signal) = tokio::sync::mpsc::channel::<()>(1);
    let addr = (args.listen_host, args.port).into();
    let mut server_task = tokio::spawn(async move {
        Server::bind(&addr)
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                shutdown_signal.recv().await;
                info!("graceful shutdown request received");
            })
            .await
    });

    // Graceful shutdown detection
    select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(%err, "Unable to listen for shutdown signal");
                // we also shut down in case of error
            }
        }
        task_result = &mut server_task => {
            // The server stopped on its own, which only happens on errors.
            task_result??;
            bail!("server stopped unexpectedly");
        }
    }

    shutdown_trigger
        .send(())
        .await
        .context("Could not trigger shutdown signal")?;

    select! {
        _ = tokio::signal::ctrl_c() => {
            bail!("forced shutdown from additional signal")
        }
        task_result = server_task => {
            match task_result {
                Ok(Ok(())) => info!("shutdown complete"),
                Ok(Err(server_error)) => {
                    error!(?server_error, "server error during shutdown");
                    bail!("server error during shutdown: {server_error}")
                }
                Err(join_error) => {
                    error!(?join_error, "server task failed during shutdown");
                    bail!("server task failed during shutdown: {join_error}")
                }
            };
            Ok(())
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::timeout;
use tower::BoxError;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use logtap::collector::Collector;
use logtap::init::args::StartArgs;

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Follow files until interrupted
    Start(Box<StartArgs>),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "logtap")]
#[command(bin_name = "logtap")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LOGTAP_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Start(args)) => {
            let _guard = match init_logging(opt.log_format) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("logtap: cannot initialize logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = run_collector(args) {
                error!(error = e, "Failed to run collector.");
                return ExitCode::from(1);
            }
        }
        None => {
            // unreachable with subcommand_required
            eprintln!("Must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_collector(args: Box<StartArgs>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = args.build_config();
    config.validate()?;

    let (identifier, files) = args.resolve_files()?;
    let sink = args.build_sink()?;

    let mut collector = Collector::new(sink).with_config(config);
    if let Some(identifier) = identifier {
        collector = collector.with_identifier(identifier);
    }
    let collector = Arc::new(collector);

    for file in files {
        let entry = collector.register(file.path, &file.pattern, None).await?;
        info!(entry = %entry.id(), path = ?entry.path(), "Registered file");
    }

    collector.start().await?;

    let waiter = {
        let collector = collector.clone();
        tokio::spawn(async move { collector.wait().await })
    };

    signal_wait().await;
    info!("Shutdown signal received.");

    for failure in collector.failures().await {
        warn!(entry = %failure.id, path = ?failure.path, error = %failure.error, "File was not followed");
    }

    match timeout(args.stop_timeout(), collector.stop()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Timed out waiting for watch tasks to exit");
            return Err("timed out stopping collector".into());
        }
    }

    waiter.await??;
    Ok(())
}

fn init_logging(log_format: LogFormatArg) -> Result<WorkerGuard, BoxError> {
    LogTracer::init()?;

    // Records go to stdout with the console sink, keep logs on stderr
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("notify=warn".parse()?);

    match log_format {
        LogFormatArg::Json => {
            let bunyan = BunyanFormattingLayer::new(env!("CARGO_PKG_NAME").to_string(), writer);
            let subscriber = Registry::default()
                .with(filter)
                .with(JsonStorageLayer)
                .with(bunyan);
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormatArg::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .compact();
            let subscriber = Registry::default().with(filter).with(fmt_layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(guard)
}

fn get_version() -> String {
    match option_env!("LOGTAP_BUILD_SHA") {
        Some(sha) => format!("{}-{}", env!("CARGO_PKG_VERSION"), sha),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

async fn signal_wait() {
    let sig_term = signal(SignalKind::terminate());
    let sig_int = signal(SignalKind::interrupt());

    match (sig_term, sig_int) {
        (Ok(mut sig_term), Ok(mut sig_int)) => {
            select! {
                _ = sig_term.recv() => {},
                _ = sig_int.recv() => {},
            }
        }
        _ => {
            warn!("Unable to install signal handlers, falling back to ctrl-c");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

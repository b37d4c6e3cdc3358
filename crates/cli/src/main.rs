mod args;
mod runner;
mod output;

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use args::{Cli, Commands};
use runner::{run_pipeline, run_receiver, RunConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Run {
            source,
            interface,
            dump,
            fixture,
            transport,
            connect,
            connect_timeout,
            capacity,
            rescan_interval_ms,
            batches,
            ack_delay_ms,
            app,
            output_format,
        } => {
            run_pipeline(RunConfig {
                source,
                interface,
                dump,
                fixture,
                transport,
                connect,
                connect_timeout: Duration::from_millis(connect_timeout),
                capacity,
                rescan_interval: Duration::from_millis(rescan_interval_ms),
                batches,
                ack_delay: Duration::from_millis(ack_delay_ms),
                app,
                output_format,
            })
            .await?;
        }
        Commands::Receive {
            listen,
            app,
            output_format,
        } => {
            run_receiver(listen, app, output_format).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, json: bool) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    // stdout carries the board output
    if json {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}

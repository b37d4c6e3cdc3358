use clap::{Parser, Subcommand};
use detective_common::{DEFAULT_COMPANION_APP, DEFAULT_QUEUE_CAPACITY};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "detective")]
#[command(version = "0.1.0")]
#[command(about = "Streams nearby WiFi networks to a paired display and flags new open ones", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan and deliver networks until Ctrl-C or the batch limit
    Run {
        /// Scan source: iw (live) or fixture (recorded JSON)
        #[arg(short, long, default_value = "iw", value_parser = ["iw", "fixture"])]
        source: String,

        /// Wireless interface for the iw source (overrides DETECTIVE_IW_INTERFACE)
        #[arg(short, long)]
        interface: Option<String>,

        /// Read cached iw results instead of triggering a scan
        #[arg(long)]
        dump: bool,

        /// Fixture file for the fixture source
        #[arg(short, long, required_if_eq("source", "fixture"))]
        fixture: Option<String>,

        /// Transport: loopback (in-process receiver) or tcp
        #[arg(short, long, default_value = "loopback", value_parser = ["loopback", "tcp"])]
        transport: String,

        /// Receiver address for the tcp transport. Example: 127.0.0.1:7400
        #[arg(short, long, required_if_eq("transport", "tcp"))]
        connect: Option<String>,

        /// Connect timeout in milliseconds
        #[arg(long, default_value = "3000")]
        connect_timeout: u64,

        /// Delivery queue capacity (records per batch, Cleanup included)
        #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
        capacity: usize,

        /// Delay before rescanning once a batch is delivered, in milliseconds
        #[arg(long, default_value = "0")]
        rescan_interval_ms: u64,

        /// Stop after this many batches
        #[arg(short, long)]
        batches: Option<u64>,

        /// Simulated ack latency for the loopback transport, in milliseconds
        #[arg(long, default_value = "0")]
        ack_delay_ms: u64,

        /// Companion app id launched on the far end
        #[arg(long, default_value_t = DEFAULT_COMPANION_APP)]
        app: Uuid,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        output_format: String,
    },

    /// Run the far-end receiver and print what it shows
    Receive {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:7400")]
        listen: String,

        /// Companion app id this receiver hosts
        #[arg(long, default_value_t = DEFAULT_COMPANION_APP)]
        app: Uuid,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        output_format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::parse_from(["detective", "run"]);
        match cli.command {
            Commands::Run {
                source,
                transport,
                capacity,
                app,
                batches,
                ..
            } => {
                assert_eq!(source, "iw");
                assert_eq!(transport, "loopback");
                assert_eq!(capacity, 16);
                assert_eq!(app, DEFAULT_COMPANION_APP);
                assert_eq!(batches, None);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_fixture_requires_file() {
        assert!(Cli::try_parse_from(["detective", "run", "--source", "fixture"]).is_err());
        assert!(Cli::try_parse_from(["detective", "run", "-s", "fixture", "-f", "scan.json"]).is_ok());
    }

    #[test]
    fn test_tcp_requires_address() {
        assert!(Cli::try_parse_from(["detective", "run", "--transport", "tcp"]).is_err());
        let cli = Cli::try_parse_from([
            "detective", "-vv", "run", "-t", "tcp", "-c", "127.0.0.1:7400",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_receive() {
        let cli = Cli::parse_from(["detective", "receive", "--listen", "0.0.0.0:9000", "--json-logs"]);
        assert!(cli.json_logs);
        match cli.command {
            Commands::Receive { listen, .. } => assert_eq!(listen, "0.0.0.0:9000"),
            _ => panic!("expected receive"),
        }
    }
}

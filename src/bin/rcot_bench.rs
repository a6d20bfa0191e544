//! Random COT throughput benchmark.
//!
//! Run one process per party, for example:
//!
//! ```text
//! rcot_bench 1 12345 20 &
//! rcot_bench 2 12345 20
//! ```

use std::process;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ot_bench::config::{DEFAULT_CHANNELS, DEFAULT_HOST, DEFAULT_LOG2};
use ot_bench::{run_party, OutputFormat, Party, RunConfig, Variant};

#[derive(Parser, Debug)]
#[command(name = "rcot_bench", version, about = "Benchmark random correlated OT extension")]
struct Args {
    /// 1 (initiator, listens) or 2 (responder, connects)
    party: Party,

    /// First port; channel i uses port + i
    port: u16,

    /// Generate 2^LOG2 COTs in the buffered phase
    #[arg(default_value_t = DEFAULT_LOG2)]
    log2: u32,

    #[arg(long, default_value_t = DEFAULT_CHANNELS)]
    channels: usize,

    /// Address the responder dials
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Skip the malicious-security consistency check
    #[arg(long)]
    semi_honest: bool,

    #[arg(long, value_enum, default_value_t = Variant::Regular)]
    variant: Variant,

    /// Leave Nagle's algorithm enabled
    #[arg(long)]
    no_nodelay: bool,

    /// Check the generated COTs with the peer (untimed)
    #[arg(long)]
    verify: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig {
            party: args.party,
            host: args.host,
            port: args.port,
            channels: args.channels,
            log2: args.log2,
            malicious: !args.semi_honest,
            variant: args.variant,
            nodelay: !args.no_nodelay,
            verify: args.verify,
            format: args.format,
        }
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ot_bench=info,rcot_bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = RunConfig::from(Args::parse());
    tracing::info!(
        party = %config.party,
        port = config.port,
        channels = config.channels,
        log2 = config.log2,
        malicious = config.malicious,
        "starting"
    );

    let report = match run_party(&config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("rcot_bench: {e}");
            process::exit(1);
        }
    };

    match report.render(config.format) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("rcot_bench: failed to render report: {e}");
            process::exit(1);
        }
    }
}

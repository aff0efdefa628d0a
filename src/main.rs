//! Mock peer CLI
//!
//! Connects to a test harness on the control port, listens for the client
//! under test on the peer port, and relays one payload at a time between them.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mock_peer::config::{DEFAULT_MAX_PEERS, DEFAULT_READ_BLOCK_SIZE, resolve};
use mock_peer::{Exit, RelayBuilder, install_interrupt_handler};

/// Emulates a single remote peer for a protocol implementation under test.
#[derive(Parser)]
#[command(name = "mock-peer")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port the harness listens on for the control connection.
    control_port: u16,

    /// Port to listen on for peer connections.
    peer_port: u16,

    /// Host used for both the control connection and the peer listener.
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Bytes requested per read.
    #[arg(long, default_value_t = DEFAULT_READ_BLOCK_SIZE)]
    block_size: usize,

    /// Peers held at once before new ones are turned away.
    #[arg(long, default_value_t = DEFAULT_MAX_PEERS)]
    max_peers: usize,

    /// Close peers left unserved for this many milliseconds.
    #[arg(long)]
    peer_timeout_ms: Option<u64>,

    /// Append log output to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_tracing(args.verbose, args.log_file.as_ref())?;

    let control_addr = resolve(&args.host, args.control_port)?;
    let listen_addr = resolve(&args.host, args.peer_port)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        control = %control_addr,
        listen = %listen_addr,
        block_size = args.block_size,
        max_peers = args.max_peers,
        "starting mock peer"
    );

    let mut builder = RelayBuilder::new(control_addr, listen_addr)
        .read_block_size(args.block_size)
        .max_peers(args.max_peers);

    if let Some(ms) = args.peer_timeout_ms {
        builder = builder.peer_idle_timeout(Duration::from_millis(ms));
    }

    let relay = builder.build()?;
    install_interrupt_handler(relay.shutdown_handle())?;

    match relay.run()? {
        Exit::ControlClosed => info!("control went away, exiting"),
        Exit::Cancelled => info!("closing the mock peer"),
    }

    Ok(())
}

fn setup_tracing(verbose: u8, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());
    let subscriber = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            subscriber
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => subscriber.with(fmt::layer()).init(),
    }

    Ok(())
}

use std::net::{Ipv4Addr, SocketAddr};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tracy_client::discovery::wait_for_announcement;
use tracy_client::protocol::{DEFAULT_MAX_BODY_SIZE, DEFAULT_TRACER_PORT};
use tracy_client::{ClientBuilder, TraceEvent, TraceSink, DEFAULT_HOST};

#[derive(Parser, Debug)]
#[command(name = "tracy-client")]
#[command(author, version, about = "Print trace events pushed by a tracy tracer", long_about = None)]
struct Cli {
    /// Tracer host name or address
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Tracer TCP port
    #[arg(short, long, default_value_t = DEFAULT_TRACER_PORT)]
    port: u16,

    /// Wait for a tracer announcement on this UDP address instead of using --host/--port
    #[arg(long, value_name = "ADDR")]
    discover: Option<SocketAddr>,

    /// Multicast group to join while discovering
    #[arg(long, value_name = "IP", requires = "discover")]
    multicast_group: Option<Ipv4Addr>,

    /// Largest frame body accepted from the tracer
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_SIZE)]
    max_body_size: u32,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Prints every event to stdout.
struct PrintSink;

impl TraceSink for PrintSink {
    fn on_trace_event(&mut self, event: TraceEvent) {
        let secs = event.timestamp_ns / 1_000_000_000;
        let nanos = event.timestamp_ns % 1_000_000_000;
        println!(
            "{} {}.{:09} {:?}",
            event.tracepoint_name(),
            secs,
            nanos,
            event.payload
        );
    }

    fn on_tracepoints_discovered(&mut self, names: &[String]) {
        tracing::info!("Tracepoints: {}", names.join(", "));
    }

    fn on_connection_lost(&mut self) {
        tracing::info!("Connection to tracer lost");
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> tracy_client::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut builder = ClientBuilder::new()
        .host(cli.host)
        .port(cli.port)
        .max_body_size(cli.max_body_size);

    if let Some(bind) = cli.discover {
        let (addr, _announcement) = wait_for_announcement(bind, cli.multicast_group).await?;
        builder = builder.address(addr);
    }

    let client = builder.connect(PrintSink).await?;
    client.wait_for_shutdown().await?;
    Ok(())
}

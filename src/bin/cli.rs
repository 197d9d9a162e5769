use std::time::Duration;

use clap::Parser;
use tokio::io::{self, BufReader};
use tracing::debug;

use redislink::shell::{self, Shell, DEFAULT_HOST, DEFAULT_PORT};
use redislink::{Error, LinkConfig, RedisLink};

#[derive(Parser, Debug)]
#[command(version, about = "Interactive shell for a Redis-compatible server")]
struct Args {
    /// The host to connect to
    #[arg(long, env = "REDIS_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// The port to connect to
    #[arg(short, long, env = "REDIS_PORT", default_value_t = DEFAULT_PORT, value_parser = shell::parse_port)]
    port: u16,

    /// How long to wait for each reply, in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    /// Give up on connecting after this many milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Start disconnected instead of connecting right away
    #[arg(long)]
    no_connect: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    // Stdout carries the shell output, logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let mut config =
        LinkConfig::from_env().with_response_timeout(Duration::from_millis(args.timeout_ms));
    if let Some(ms) = args.connect_timeout_ms {
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }

    let (link, events) = RedisLink::new(config);
    let mut shell = Shell::new(link, events, args.host, args.port, io::stdout());

    if !args.no_connect {
        shell.connect().await?;
    }

    shell.run(BufReader::new(io::stdin())).await
}

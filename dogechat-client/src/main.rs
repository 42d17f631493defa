use anyhow::Result;
use clap::Parser;
use std::time::Duration;

mod app;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    // stdout belongs to the chat itself
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the user
    #[arg(short, long, default_value = "Anonymous")]
    name: String,

    /// Chat server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Chat server port
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Seconds to wait for the connection before giving up
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    app::run(
        args.host,
        args.port,
        args.name,
        Duration::from_secs(args.connect_timeout),
    )
    .await?;
    Ok(())
}

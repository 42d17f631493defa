/// DogeChat relay server
use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind to this addr
    #[arg(short, long, default_value = "localhost:8080")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let listener = TcpListener::bind(&args.addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "relay listening");
    dogechat_server::serve(listener).await?;
    Ok(())
}

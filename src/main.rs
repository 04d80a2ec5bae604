use clap::Parser;
use std::io;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use shortcut::config;
use shortcut::proxy::{self, ProxyConfig};
use shortcut::upstream::QueryMethod;

#[derive(Parser)]
#[command(name = "shortcut")]
#[command(about = "Latency-aware DNS-over-HTTPS proxy", long_about = None)]
struct Args {
    /// Local port to listen on
    #[arg(short, long, default_value = "8053")]
    port: u16,

    /// Bind address
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: String,

    /// Send upstream queries as GET with a base64url payload instead of POST
    #[arg(long)]
    get: bool,

    /// Enable verbose logging (per-query events)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "shortcut=debug"
    } else {
        "shortcut=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .expect("invalid bind address");

    let config = ProxyConfig {
        bind_addr,
        upstreams: config::configured_upstreams(),
        method: if args.get {
            QueryMethod::Get
        } else {
            QueryMethod::Post
        },
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(proxy::run(config))
}

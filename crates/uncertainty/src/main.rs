use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uncertainty::{Config, FaultServer, Handler, StaticHandler, UpstreamHandler};

#[derive(Parser, Debug)]
#[command(name = "uncertainty")]
#[command(author, version, about = "HTTP fault injection server", long_about = None)]
struct Args {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the YAML configuration file
    #[arg(short, long, env = "UNCERTAINTY_CONFIG")]
    config: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => {
            let config = Config::from_file(path)?;
            info!("Loaded configuration from {} ({} routes)", path, config.routes.len());
            config
        }
        None => {
            info!("No configuration given, every request passes through");
            Config::default()
        }
    };
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    let dispatcher = config.build_dispatcher()?;
    let downstream: Arc<dyn Handler> = match &config.upstream {
        Some(upstream) => {
            info!("Forwarding pass-through traffic to {}", upstream.url);
            Arc::new(UpstreamHandler::new(upstream)?)
        }
        None => Arc::new(StaticHandler::default()),
    };

    let addr = config.listen.socket_addr().await?;
    let server = FaultServer::new(addr, dispatcher, downstream);

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }
    Ok(())
}

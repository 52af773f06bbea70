//! API Markdown Mock Server - CLI Entry Point

use anyhow::Result;
use apimd_mock_server::{MockServer, MockServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "apimd-mock-server",
    about = "Mock HTTP server driven by API documentation written in Markdown",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "apimd.yaml")]
    config: PathBuf,

    /// Markdown document describing the endpoints
    #[arg(short, long, value_name = "FILE")]
    source: Option<PathBuf>,

    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[arg(short, long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Forward undocumented routes to this server (e.g., "http://127.0.0.1:8080")
    #[arg(short, long, value_name = "URI")]
    upstream: Option<String>,

    /// Reload the document whenever it changes
    #[arg(long)]
    live: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and document, then exit
    #[arg(long)]
    validate: bool,

    /// Print the parsed endpoints as JSON and exit
    #[arg(long)]
    print_endpoints: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../demos/apimd.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        MockServerConfig::from_file(&args.config)?
    } else {
        info!("Using default configuration");
        MockServerConfig::default()
    };

    // Command line overrides
    if let Some(source) = args.source {
        config.source = source;
    }
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if args.upstream.is_some() {
        config.upstream = args.upstream;
    }
    if args.live {
        config.live = true;
    }
    config.validate()?;

    // Validate or dump and exit if requested
    if args.validate || args.print_endpoints {
        let endpoints = apimd_mock_server::load(&config.source).await?;
        if args.print_endpoints {
            println!("{}", serde_json::to_string_pretty(&endpoints)?);
        } else {
            println!(
                "Configuration is valid ({} endpoints in {} routes)",
                endpoints.len(),
                endpoints.routes()
            );
        }
        return Ok(());
    }

    let server = MockServer::new(config);
    if let Err(e) = server.load().await {
        if !server.config().live {
            return Err(e.into());
        }
        warn!(error = %e, "Starting with no endpoints, will retry on the next request");
    }

    let server = Arc::new(server);
    tokio::select! {
        result = server.serve() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}

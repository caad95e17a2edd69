//! Plaza console client.
//!
//! # Usage
//!
//! ```bash
//! # Open the feed on a local server
//! plaza --url http://127.0.0.1:5000 --token "$CSRF"
//!
//! # Start in a chat, with a separate realtime endpoint
//! plaza --path /chat/42 --realtime-url wss://rt.plaza.example/ws
//! ```

use std::sync::Arc;

use clap::Parser;
use plaza_app::Runtime;
use plaza_cli::ConsoleDriver;
use plaza_client::{Api, ClientConfig, HttpApi, RealtimeClient, SystemEnv, WsConnector};
use plaza_core::PageContext;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Plaza console client
#[derive(Parser, Debug)]
#[command(name = "plaza")]
#[command(about = "Headless Plaza client driven by line commands")]
#[command(version)]
struct Args {
    /// Server root
    #[arg(short, long, env = "PLAZA_URL", default_value = "http://127.0.0.1:5000")]
    url: String,

    /// Realtime endpoint (derived from the server root when absent)
    #[arg(long, env = "PLAZA_REALTIME_URL")]
    realtime_url: Option<String>,

    /// Session token used for the CSRF header and realtime authentication
    #[arg(short, long, env = "PLAZA_TOKEN")]
    token: Option<String>,

    /// Page to open first
    #[arg(short, long, default_value = "/")]
    path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = ClientConfig::new(args.url);
    config.realtime_url = args.realtime_url;
    let realtime_url = config.realtime()?;
    let api = HttpApi::new(&config, args.token.as_deref())?;

    let me = match api.me().await {
        Ok(info) if info.authenticated => {
            tracing::info!(user = ?info.username, "signed in");
            info.id
        },
        Ok(_) => {
            tracing::warn!("session is not signed in");
            None
        },
        Err(error) => {
            tracing::warn!(%error, "could not load the session, continuing without it");
            None
        },
    };

    let env = SystemEnv::new();
    let realtime = RealtimeClient::spawn(
        env.clone(),
        Arc::new(WsConnector),
        realtime_url.to_string(),
        args.token.unwrap_or_default(),
        PageContext::from_path(&args.path),
        &config,
    );

    tracing::info!(realtime = %realtime_url, path = %args.path, "Plaza console starting (type `help`)");

    let runtime = Runtime::new(ConsoleDriver::new(), env, realtime, Arc::new(api), &config, me);
    runtime.run(&args.path).await?;

    Ok(())
}

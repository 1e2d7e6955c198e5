//! dnsdb-relay
//!
//! Relay Farsight DNSDB passive DNS into threat-response sightings.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use dnsdb_relay::api::{AppState, create_router};
use dnsdb_relay::config::{self, Settings};

/// dnsdb-relay
#[derive(Parser, Debug)]
#[command(name = "dnsdb-relay")]
#[command(about = "Relay Farsight DNSDB passive DNS into threat-response sightings")]
struct Args {
    /// Server host
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Server port
    #[arg(long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Upstream passive-DNS API base URL
    #[arg(long, env = "DNSDB_API_URL", default_value = config::DEFAULT_API_URL)]
    api_url: String,

    /// Search-UI deep-link template; {query} is replaced per observable
    #[arg(long, env = "DNSDB_UI_SEARCH_URL", default_value = config::DEFAULT_UI_SEARCH_URL)]
    ui_search_url: String,

    /// Default result limit per observable
    #[arg(long, env = "CTR_ENTITIES_LIMIT", default_value = "100")]
    entities_limit: usize,

    /// Ceiling for caller-supplied limit overrides
    #[arg(long, env = "CTR_ENTITIES_LIMIT_MAX", default_value = "1000")]
    entities_limit_max: usize,

    /// Collapse each lookup into one aggregated sighting by default
    #[arg(long, env = "AGGREGATE", default_value_t = true, action = clap::ArgAction::Set)]
    aggregate: bool,

    /// Day window for the upstream time filter in aggregation mode
    #[arg(long, env = "DNSDB_TIME_FILTER_DAYS", default_value = "90")]
    time_filter_days: i64,

    /// User-Agent header sent upstream
    #[arg(long, env = "DNSDB_USER_AGENT", default_value = config::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Upstream request timeout in seconds
    #[arg(long, env = "DNSDB_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnsdb_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    tracing::info!("Starting dnsdb-relay");

    Url::parse(&args.api_url).context("Invalid upstream API URL")?;

    let settings = Settings {
        api_url: args.api_url,
        ui_search_url: args.ui_search_url,
        user_agent: args.user_agent,
        entities_limit_default: args.entities_limit,
        entities_limit_max: args.entities_limit_max,
        aggregate_default: args.aggregate,
        time_filter_days: args.time_filter_days,
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;

    let state = Arc::new(AppState { http, settings });

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! Dashboard server: the question page and its JSON API.

use anyhow::Result;
use clap::Parser;
use nl2sql_dashboard::config::{log_filter, ConfigArgs};
use nl2sql_dashboard::dashboard::Dashboard;
use nl2sql_dashboard::llm::model_from_config;
use nl2sql_dashboard::server::serve;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "nl2sql-server")]
#[command(about = "Serve the NL2SQL dashboard")]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,

    /// Address to listen on (overrides NL2SQL_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let args = Args::parse();
    let mut config = args.config.load()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    info!(
        model = %config.model_path.display(),
        llm_url = %config.llm_base_url,
        context_size = config.generation.context_size,
        threads = config.generation.threads,
        temperature = config.generation.temperature,
        "loading dashboard"
    );
    let model = model_from_config(&config, args.config.fixed_response.clone());
    let dashboard = Arc::new(Dashboard::open(&config, model)?);
    info!(model = dashboard.model_name(), "model ready");

    let listener = TcpListener::bind(config.bind).await?;
    info!("Open http://{} in a browser", listener.local_addr()?);

    tokio::select! {
        result = serve(listener, dashboard) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}

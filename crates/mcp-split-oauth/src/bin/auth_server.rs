//! Standalone OAuth 2.0 authorization server - entry point.

use clap::Parser;

use mcp_split_oauth::auth::AuthorizationServer;
use mcp_split_oauth::config::{AuthServerConfig, defaults};
use mcp_split_oauth::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "mcp-auth-server")]
#[command(about = "Standalone OAuth 2.0 authorization server for MCP")]
#[command(version)]
struct Cli {
    /// Host to bind
    #[arg(long, default_value = "localhost", env = "AUTH_SERVER_HOST")]
    host: String,

    /// Port to bind
    #[arg(long, default_value = "9000", env = "AUTH_SERVER_PORT")]
    port: u16,

    /// Username the demo login form accepts
    #[arg(long, default_value = defaults::DEMO_USERNAME, env = "DEMO_USERNAME")]
    demo_username: String,

    /// Password the demo login form accepts
    #[arg(long, default_value = defaults::DEMO_PASSWORD, env = "DEMO_PASSWORD")]
    demo_password: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting authorization server");

    let mut config = AuthServerConfig::new(cli.host, cli.port);
    config.demo_username = cli.demo_username;
    config.demo_password = cli.demo_password;

    AuthorizationServer::new(config).run().await
}

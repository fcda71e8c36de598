//! Introspection-protected MCP resource server - entry point.

use clap::Parser;

use mcp_split_oauth::config::ResourceConfig;
use mcp_split_oauth::logging::init_tracing;
use mcp_split_oauth::resource::ResourceServer;

#[derive(Parser, Debug)]
#[command(name = "mcp-resource-server")]
#[command(about = "MCP resource server that verifies tokens by introspection")]
#[command(version)]
struct Cli {
    /// Host to bind
    #[arg(long, default_value = "localhost", env = "RESOURCE_SERVER_HOST")]
    host: String,

    /// Port to bind
    #[arg(long, default_value = "8080", env = "RESOURCE_SERVER_PORT")]
    port: u16,

    /// Base URL of the authorization server
    #[arg(long, default_value = "http://localhost:9000", env = "AUTH_SERVER_URL")]
    auth_server: String,

    /// Scopes every token must carry (comma separated)
    #[arg(long, default_value = "user", value_delimiter = ',')]
    required_scope: Vec<String>,

    /// Reject tokens whose audience does not cover this resource (RFC 8707)
    #[arg(long, env = "OAUTH_STRICT")]
    oauth_strict: bool,

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

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting resource server");

    let mut config = ResourceConfig::new(cli.host, cli.port, cli.auth_server);
    config.required_scopes = cli.required_scope;
    config.oauth_strict = cli.oauth_strict;

    ResourceServer::new(config)?.run().await
}

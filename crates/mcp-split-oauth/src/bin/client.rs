//! Lazy OAuth MCP client - entry point.
//!
//! Starts with no credentials. The first command that talks to the server
//! triggers discovery, registration, and the browser authorization flow;
//! after that the cached session is reused and refreshed as needed.

use std::io::Write as _;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use mcp_split_oauth::AuthClient;
use mcp_split_oauth::config::ClientConfig;
use mcp_split_oauth::logging::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "mcp-client")]
#[command(about = "Interactive MCP client with lazy OAuth authentication")]
#[command(version)]
struct Cli {
    /// Base URL of the resource server
    #[arg(long, default_value = "http://localhost:8080", env = "MCP_SERVER_URL")]
    server_url: String,

    /// Loopback port for the authorization callback
    #[arg(long, default_value = "3030", env = "CALLBACK_PORT")]
    callback_port: u16,

    /// Seconds to wait for the authorization callback
    #[arg(long, default_value = "300")]
    flow_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
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

    let mut config = ClientConfig::new(cli.server_url.clone());
    config.callback_port = cli.callback_port;
    config.flow_timeout = Duration::from_secs(cli.flow_timeout_secs);

    let client = AuthClient::new(config)?;

    println!("MCP client for {}", cli.server_url);
    println!("No credentials yet; the first command will start authorization.\n");
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("mcp> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "quit" | "exit" => break,
            "help" => print_help(),
            "status" => show_status(&client).await,
            "list" => list_tools(&client).await,
            "call" => call_tool(&client, rest).await,
            other => println!("Unknown command: {other}. Type 'help' for commands."),
        }
    }

    println!("Goodbye");
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  list                     List available tools");
    println!("  call <tool> [json-args]  Call a tool, e.g. call echo {{\"message\": \"hi\"}}");
    println!("  status                   Show the current session");
    println!("  help                     Show this help");
    println!("  quit                     Exit");
}

async fn show_status(client: &AuthClient) {
    match client.current_session().await {
        Some(session) => {
            println!("Authenticated as client {}", session.client_id);
            if let Some(scope) = session.scope.as_deref() {
                println!("  scope:   {scope}");
            }
            match session.expires_at {
                Some(expires_at) => println!("  expires: {}", expires_at.to_rfc3339()),
                None => println!("  expires: never"),
            }
            println!("  refresh: {}", if session.refresh_token.is_some() { "yes" } else { "no" });
        }
        None => println!("Not authenticated yet"),
    }
}

async fn list_tools(client: &AuthClient) {
    match client.list_tools().await {
        Ok(tools) => {
            for tool in tools {
                println!("  {} - {}", tool.name, tool.description);
            }
        }
        Err(error) => println!("Error: {error}"),
    }
}

async fn call_tool(client: &AuthClient, rest: &str) {
    let (name, raw_args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        println!("Usage: call <tool> [json-args]");
        return;
    }

    let arguments = if raw_args.is_empty() {
        serde_json::json!({})
    } else {
        match serde_json::from_str(raw_args) {
            Ok(value) => value,
            Err(error) => {
                println!("Arguments are not valid JSON: {error}");
                return;
            }
        }
    };

    match client.call_tool(name, arguments).await {
        Ok(result) => print_tool_result(&result),
        Err(error) => println!("Error: {error}"),
    }
}

/// Print the text content from a tools/call result, falling back to the raw
/// JSON for anything unexpected.
fn print_tool_result(result: &serde_json::Value) {
    if let Some(content) = result.get("content").and_then(serde_json::Value::as_array) {
        for item in content {
            if let Some(text) = item.get("text").and_then(serde_json::Value::as_str) {
                println!("{text}");
            }
        }
        return;
    }
    match serde_json::to_string_pretty(result) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{result}"),
    }
}

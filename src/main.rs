//! TickTick MCP - task and project management over the Model Context Protocol
//!
//! Runs as an MCP server on stdio by default; the `oauth-server` subcommand
//! starts the HTTP bootstrap flow for acquiring the first OAuth token.

use clap::{Parser, Subcommand};
use rmcp::{transport::io::stdio, ServiceExt};
use std::sync::Arc;

use ticktick_mcp::{config, init_tracing, web, AuthManager, Credentials, TickTickMcpServer};

#[derive(Parser)]
#[command(name = "ticktick-mcp", about = "TickTick MCP server", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server on stdio (the default)
    Serve,
    /// Run the HTTP server for the interactive OAuth authorization flow
    OauthServer {
        /// Port to listen on
        #[arg(long, default_value_t = 8000, env = "PORT")]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("ticktick_mcp")?;

    let cli = Cli::parse();
    let credentials = Credentials::from_env()?;
    let auth = Arc::new(AuthManager::new(
        credentials.clone(),
        config::token_cache_path(),
    ));

    let command = cli.command.unwrap_or_else(default_command);

    match command {
        Command::Serve => {
            tracing::info!("starting TickTick MCP server on stdio");
            let server = TickTickMcpServer::new(credentials, auth);
            let service = server.serve(stdio()).await?;
            service.waiting().await?;
            tracing::info!("TickTick MCP server stopped");
        }
        Command::OauthServer { port } => {
            web::serve(auth, port).await?;
        }
    }

    Ok(())
}

/// With no subcommand, `MCP_TRANSPORT` picks the mode: anything other than
/// stdio means the process was launched for the HTTP bootstrap flow.
fn default_command() -> Command {
    match std::env::var("MCP_TRANSPORT") {
        Ok(transport) if !transport.eq_ignore_ascii_case("stdio") => {
            tracing::info!(
                transport,
                "MCP_TRANSPORT is not stdio, starting the OAuth HTTP server"
            );
            let port = std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000);
            Command::OauthServer { port }
        }
        _ => Command::Serve,
    }
}

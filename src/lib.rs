//! TickTick MCP Library
//!
//! OAuth2 token lifecycle, authenticated TickTick API client, and client-side
//! task filtering, exposed as MCP tools.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use ticktick_mcp::{AuthManager, Credentials, TickTickMcpServer};
//!
//! let credentials = Credentials::from_env()?;
//! let auth = Arc::new(AuthManager::new(credentials.clone(), config::token_cache_path()));
//! let server = TickTickMcpServer::new(credentials, auth);
//! // Serve via stdio or an in-memory transport
//! ```
//!
//! # Configuration
//! Set `TICKTICK_CLIENT_ID`, `TICKTICK_CLIENT_SECRET` and
//! `TICKTICK_REDIRECT_URI`; see [`config`] for the optional variables
//! (pre-issued tokens, headless injection, unofficial API credentials).

pub mod auth;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod handlers;
pub mod params;
pub mod server;
#[cfg(test)]
mod tests;
pub mod ticktick;
pub mod web;

// Re-export the main entry points
pub use auth::AuthManager;
pub use config::Credentials;
pub use server::TickTickMcpServer;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the server.
///
/// Logs go to stderr because stdout carries the MCP protocol. `RUST_LOG`
/// overrides the default `info` level for this crate; `LOG_FORMAT=json`
/// switches to structured output for log aggregation.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env().add_directive(directive.parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }

    Ok(())
}

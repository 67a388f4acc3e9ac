//! Tool server: calendars, tasks, events and journals over JSON-RPC on
//! stdio.
//!
//! - [`config`] - layered settings (`settings.toml`, `.secrets.toml`,
//!   environment)
//! - [`tools`] - the tool catalogue and argument schemas
//! - [`handler`] - JSON-RPC routing and tool dispatch to the providers
//! - [`stdio`] - the line-oriented serve loop
//!
//! # Example
//!
//! ```rust,no_run
//! use secretary_server::{ServerConfig, app, stdio};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::load(None)?;
//!     let providers = app::providers(&config)?;
//!     let handler = app::handler(&config, providers, &[])?;
//!     stdio::serve_stdio(&handler).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cli;
pub mod config;
mod error;
pub mod handler;
pub mod stdio;
pub mod tools;

pub use config::{ServerConfig, Settings};
pub use error::{ServerError, ServerResult};
pub use handler::{RequestHandler, Toolbox};
pub use tools::{Tool, ToolGroup};

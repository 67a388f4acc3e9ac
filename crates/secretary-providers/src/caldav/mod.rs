//! CalDAV client.
//!
//! - HTTP Digest and Basic authentication
//! - calendar-home discovery and PROPFIND calendar listing
//! - calendar-query REPORT, optionally expanding recurrences server side
//! - conditional PUT/DELETE guarded by entity tags
//! - MKCALENDAR for new calendars
//!
//! ```ignore
//! use secretary_providers::caldav::{CalDavClient, CalDavConfig};
//!
//! let config = CalDavConfig::new("https://dav.example.com/dav/")?
//!     .with_credentials("alice", "password");
//! let client = CalDavClient::new(config)?;
//! let calendars = client.list_calendars().await?;
//! ```

mod auth;
mod client;
mod config;
mod http;
mod xml;

pub use client::CalDavClient;
pub use config::CalDavConfig;

//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! The media backend and media session are owned by the desktop shell and
//! are not provided here.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::open_default().await?;
//!     // Hand both to `CoreDependencies`
//!     Ok(())
//! }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;

//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the other core crates:
//! - Logging and tracing infrastructure
//! - Client configuration and `instances.json` loading
//! - Event bus system

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{load_instances, ClientConfig, ClientConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};

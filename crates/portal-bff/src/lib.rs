//! Backend-for-frontend server of the member portal.
//!
//! Hosts the `portal-auth` routes next to health endpoints, with configuration
//! loading and tracing set up for the process.

pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;

pub use config::AppConfig;
pub use server::{PortalServer, ServerBuilder, build_app, build_state, create_session_backend};

//! Application wiring
//!
//! Builds the registry, settings service, recorder and router from the
//! process configuration and runs the HTTP server.

pub mod app;

pub use app::Application;

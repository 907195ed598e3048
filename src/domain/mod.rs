//! Domain types for the interceptor
//!
//! Wire shapes of the OpenAI-compatible API and validated configuration
//! values shared by the pipeline, the gateway and the settings layer.

pub mod chat;
pub mod config_types;

pub use chat::*;
pub use config_types::*;

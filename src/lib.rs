//! LLM Interceptor - a transparent proxy for OpenAI-compatible backends
//!
//! Every chat call passes through an ordered chain of toggleable transform
//! modules on the way out and on the way back. Each call is kept in a bounded
//! in-memory traffic log so operators can see what the modules changed.

pub mod admin;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod modules;
pub mod pipeline;
pub mod proxy;
pub mod settings;
pub mod traffic;

pub use application::Application;
pub use error::{Error, Result};

//! Type-safe configuration types
//!
//! Validated newtypes for the values the proxy reads from its process
//! configuration and from the persisted settings document.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bind address for the HTTP listener
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct Host(String);

impl Default for Host {
    fn default() -> Self {
        Self::try_new("0.0.0.0".to_string()).expect("Default host is valid")
    }
}

/// Port number for the HTTP listener
#[nutype(
    validate(predicate = |port| (1..=65535).contains(port)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct Port(u16);

impl Default for Port {
    fn default() -> Self {
        Self::try_new(5000).expect("Default port is valid")
    }
}

/// Base URL of the OpenAI-compatible backend, including its API version prefix
#[nutype(
    sanitize(trim),
    validate(
        not_empty,
        len_char_max = 2048,
        predicate = |url: &str| url.starts_with("http://") || url.starts_with("https://")
    ),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct BackendUrl(String);

impl Default for BackendUrl {
    fn default() -> Self {
        Self::try_new("http://localhost:11434/v1".to_string()).expect("Default backend URL is valid")
    }
}

/// API key sent to the backend as a bearer token
#[nutype(
    sanitize(trim),
    validate(not_empty),
    derive(Clone, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct ApiKey(String);

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Number of traffic records retained in memory
#[nutype(
    validate(predicate = |count| *count > 0 && *count <= 100_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct RecorderCapacity(usize);

impl Default for RecorderCapacity {
    fn default() -> Self {
        Self::try_new(1000).expect("Default recorder capacity is valid")
    }
}

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

//! `wreckproto`: the wire contract between `wreckerd` and a chat-platform adapter.
//!
//! All messages travel as newline-delimited JSON, one message per line:
//! - adapter -> core: [`gateway::GatewayUp`] (a `hello` channel announcement,
//!   then `directive` lines carrying participant utterances)
//! - core -> adapter: [`gateway::GatewayDown`] (structured render cards; the
//!   adapter owns all platform-specific formatting)
//!
//! This crate also owns the textual command grammar ([`command`]) so the core
//! and any test harness agree on what a directive means.

pub mod command;
pub mod gateway;

use serde::{Deserialize, Serialize};

/// Opaque chat-platform identity of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Chat-platform channel identifier (snowflake-style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum ProtoError {
    EmptyLine,
    Malformed(String),
}

impl std::fmt::Display for ProtoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtoError::EmptyLine => write!(f, "empty line"),
            ProtoError::Malformed(s) => write!(f, "malformed message: {s}"),
        }
    }
}

impl std::error::Error for ProtoError {}

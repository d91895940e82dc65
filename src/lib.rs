//! filekeeper: filesystem statistics and guarded deletion for AI agents
//!
//! This library provides the deletion gatekeeper (confirmation, protected
//! paths, permanent vs. trash deletion), read-only directory queries, and
//! the MCP server exposing them as tools.

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod init;
pub mod path_checker;
pub mod relocate;
pub mod scan;
pub mod server;
pub mod stats;
pub mod timeline;
pub mod trash;

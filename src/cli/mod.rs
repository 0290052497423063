//! Command-line interface.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::*;

/// Campus realtime delivery: SSE event log and WebSocket relay
#[derive(Parser)]
#[command(name = "campus-realtime")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (event publish, SSE subscribe, notifications)
    #[command(alias = "server")]
    Serve,

    /// Run the standalone WebSocket relay and its broadcast ingress
    #[command(alias = "ws")]
    Relay,

    /// Publish one event to a running server
    #[command(alias = "pub")]
    Publish {
        /// Channel name, e.g. "post:1"
        channel: String,
        /// Event name, e.g. "bookmark:updated"
        event: String,
        /// JSON payload (defaults to null)
        data: Option<String>,
        /// Override the publish endpoint
        #[arg(long)]
        url: Option<String>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

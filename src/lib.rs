//! # tcbbs - Store-and-Forward BBS for Meshtastic Networks
//!
//! tcbbs keeps mailboxes, bulletin boards and a channel directory for users of a
//! Meshtastic mesh, served through a single-letter menu over direct messages.
//! Several servers stay in step by exchanging pipe-delimited sync frames.
//!
//! ## Features
//!
//! - **Menu Interface**: Single-letter navigation with per-user state and timeouts
//! - **Mail**: Per-node mailboxes with read/keep/delete/reply and new-mail notices
//! - **Bulletins**: General, Info, News and Urgent boards; urgent posts are broadcast
//! - **Channel Directory**: Shared list of channel names and URLs
//! - **Peer Replication**: Idempotent sync frames keyed by unique id
//! - **Quick Commands**: `SM,,`, `CM`, `PB,,`, `CB,,`, `CHP,,`, `CHL`
//! - **Utilities**: Node stats, fortunes and a low-battery wall of shame
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcbbs::bbs::BbsServer;
//! use tcbbs::config::Config;
//! use tcbbs::mesh::stdio;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut server = BbsServer::new(config).await?;
//!
//!     let (event_tx, event_rx) = mpsc::unbounded_channel();
//!     let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
//!     stdio::spawn_stdin_reader(event_tx);
//!     stdio::spawn_stdout_writer(outgoing_rx);
//!
//!     server.attach_transport(event_rx, outgoing_tx);
//!     server.run().await
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`bbs`] - Server, addressing, replication and conversation engine
//! - [`mesh`] - Packet types, node directory and the stdio transport bridge
//! - [`storage`] - Sled-backed persistence
//! - [`config`] - Configuration management and validation
//! - [`validation`] - Field sanitising and node id parsing
//! - [`logutil`] - Single-line log escaping

pub mod bbs;
pub mod config;
pub mod logutil;
pub mod mesh;
pub mod storage;
pub mod validation;

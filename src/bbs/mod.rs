//! # BBS Core Module
//!
//! Message routing, peer replication and the menu interface.
//!
//! ## Components
//!
//! - [`server`] - Dispatch router and run loop
//! - [`addressing`] - Classifies inbound text as sync, command or noise
//! - [`sync`] - Replication frame parsing and application
//! - [`conversation`] - Per-user menu navigation and multi-step flows
//! - [`menu`] / [`state`] / [`render`] - Menu tables, user state, reply text
//! - [`quick`] - Single-message quick commands
//! - [`js8`] - Filing of JS8Call reports relayed by the bridge
//! - [`utilities`] / [`fortune`] - Utilities menu content
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  BbsServer      │ ← one packet at a time, failure boundary
//! └─────────────────┘
//!          │
//! ┌─────────────────┐
//! │  Addressing     │ ← SYNC / COMMAND / IGNORE
//! └─────────────────┘
//!      │         │
//! ┌────────┐ ┌──────────────┐
//! │  Sync  │ │ Conversation │
//! └────────┘ └──────────────┘
//!      │         │
//! ┌─────────────────┐
//! │  BbsStore       │ ← idempotent by unique id
//! └─────────────────┘
//! ```

pub mod addressing;
pub mod conversation;
pub mod fortune;
pub mod js8;
pub mod menu;
pub mod quick;
pub mod render;
pub mod server;
pub mod state;
pub mod sync;
pub mod utilities;

pub use server::BbsServer;

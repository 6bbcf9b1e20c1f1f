//! Addressing filter: decide whether an inbound text packet is peer sync
//! traffic, a command for this server, or something to ignore.
//!
//! Classification is pure; it only looks at the packet and the resolved
//! [`MeshIdentity`]. Rules are applied in order:
//!
//! 1. sender is a known peer and the text starts with a sync prefix → [`Route::Sync`]
//! 2. sender is a known peer otherwise → [`Route::Ignore`]
//! 3. destination is this server's node (never `0`, never broadcast) → [`Route::Command`]
//! 4. anything else → [`Route::Ignore`]

use thiserror::Error;

use crate::config::MeshIdentity;
use crate::logutil::node_label;
use crate::mesh::{MeshPacket, PortNum, BROADCAST_ADDR};

/// Frame prefixes that mark a payload as replication traffic.
pub const SYNC_PREFIXES: [&str; 5] = [
    "BULLETIN|",
    "MAIL|",
    "DELETE_BULLETIN|",
    "DELETE_MAIL|",
    "CHANNEL|",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressingError {
    #[error("packet has no sender")]
    MissingSender,
    #[error("packet has no decoded payload")]
    MissingPayload,
    #[error("packet on port {0:?} is not a text message")]
    NotText(PortNum),
    #[error("text packet carries no text")]
    MissingText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Sync,
    Command,
    Ignore,
}

/// The fields of a text packet the router works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPacket {
    pub from: u32,
    pub from_id: String,
    pub to: Option<u32>,
    pub channel: u32,
    pub text: String,
}

impl TryFrom<&MeshPacket> for TextPacket {
    type Error = AddressingError;

    fn try_from(packet: &MeshPacket) -> Result<Self, Self::Error> {
        let from = packet.from.ok_or(AddressingError::MissingSender)?;
        let decoded = packet
            .decoded
            .as_ref()
            .ok_or(AddressingError::MissingPayload)?;
        if decoded.portnum != PortNum::TextMessageApp {
            return Err(AddressingError::NotText(decoded.portnum));
        }
        let text = decoded.text.clone().ok_or(AddressingError::MissingText)?;
        Ok(TextPacket {
            from,
            from_id: packet.from_id.clone().unwrap_or_else(|| node_label(from)),
            to: packet.to,
            channel: packet.channel,
            text,
        })
    }
}

pub fn is_sync_payload(text: &str) -> bool {
    SYNC_PREFIXES.iter().any(|p| text.starts_with(p))
}

/// Destination `0` and the broadcast address are group traffic.
pub fn is_group_destination(to: Option<u32>) -> bool {
    matches!(to, None | Some(0) | Some(BROADCAST_ADDR))
}

pub fn classify(packet: &TextPacket, identity: &MeshIdentity) -> Route {
    if identity.peers.contains(&packet.from) {
        if is_sync_payload(&packet.text) {
            return Route::Sync;
        }
        return Route::Ignore;
    }
    match packet.to {
        Some(to) if !is_group_destination(packet.to) && to == identity.own_node => Route::Command,
        _ => Route::Ignore,
    }
}

//! # Mesh Transport Types
//!
//! The radio itself is driven by an external process (a Meshtastic client or
//! gateway). This module defines what crosses that boundary:
//!
//! - [`MeshPacket`] - one decoded packet as delivered by the transport
//! - [`OutgoingMessage`] - one text the server wants transmitted
//! - [`InboundEvent`] - a bridge input line: a packet or a relayed JS8Call message
//! - [`NodeDirectory`] - the node database used to resolve short names
//! - [`stdio`] - a JSON-lines bridge carrying both over stdin/stdout
//!
//! ## Packet Shape
//!
//! Packets follow the field names Meshtastic client libraries emit:
//!
//! ```json
//! {"from": 305419896, "fromId": "!12345678", "to": 2882400001,
//!  "decoded": {"portnum": "TEXT_MESSAGE_APP", "text": "m"}}
//! ```
//!
//! Destination `0` and [`BROADCAST_ADDR`] denote group traffic.
//!
//! A bridge that also listens to JS8Call relays heard messages as
//! `{"js8": {"sender": "K1ABC", "receiver": "@HB", "text": "..."}}`.

pub mod stdio;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::logutil::{escape_log, node_label};

/// Reserved destination meaning "all nodes".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;

/// Short name used when a node is missing from the directory.
pub const UNKNOWN_SHORT_NAME: &str = "Unknown";

/// Application port a decoded packet was received on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortNum {
    TextMessageApp,
    NodeinfoApp,
    TelemetryApp,
    #[serde(other)]
    Other,
}

/// User record carried by `NODEINFO_APP` packets.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub long_name: String,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub hw_model: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetrics {
    #[serde(default)]
    pub battery_level: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    #[serde(default)]
    pub device_metrics: Option<DeviceMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedPayload {
    pub portnum: PortNum,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(default)]
    pub telemetry: Option<Telemetry>,
}

/// One packet as handed over by the transport. Every field is optional on the
/// wire; the addressing filter decides which absences are fatal.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MeshPacket {
    #[serde(default)]
    pub from: Option<u32>,
    #[serde(default)]
    pub from_id: Option<String>,
    #[serde(default)]
    pub to: Option<u32>,
    #[serde(default)]
    pub channel: u32,
    #[serde(default)]
    pub decoded: Option<DecodedPayload>,
}

impl MeshPacket {
    /// Build a text packet; handy for tests and for bridges that only relay text.
    pub fn text(from: u32, to: Option<u32>, text: &str) -> Self {
        MeshPacket {
            from: Some(from),
            from_id: Some(node_label(from)),
            to,
            channel: 0,
            decoded: Some(DecodedPayload {
                portnum: PortNum::TextMessageApp,
                text: Some(text.to_string()),
                user: None,
                telemetry: None,
            }),
        }
    }

    pub fn portnum(&self) -> Option<PortNum> {
        self.decoded.as_ref().map(|d| d.portnum)
    }
}

/// A JS8Call message relayed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Js8Report {
    pub sender: String,
    pub receiver: String,
    pub text: String,
}

/// One unit of bridge input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundEvent {
    Js8 { js8: Js8Report },
    Packet(MeshPacket),
}

impl From<MeshPacket> for InboundEvent {
    fn from(packet: MeshPacket) -> Self {
        InboundEvent::Packet(packet)
    }
}

impl From<Js8Report> for InboundEvent {
    fn from(js8: Js8Report) -> Self {
        InboundEvent::Js8 { js8 }
    }
}

/// Outgoing message handed to the transport writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// `None` for broadcast, `Some(node)` for a direct message.
    #[serde(rename = "to")]
    pub to_node: Option<u32>,
    pub channel: u32,
    #[serde(rename = "text")]
    pub content: String,
}

impl OutgoingMessage {
    pub fn direct(to: u32, channel: u32, content: impl Into<String>) -> Self {
        Self {
            to_node: Some(to),
            channel,
            content: content.into(),
        }
    }

    pub fn broadcast(channel: u32, content: impl Into<String>) -> Self {
        Self {
            to_node: None,
            channel,
            content: content.into(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self.to_node, None | Some(BROADCAST_ADDR))
    }
}

/// Directory entry for one mesh node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node_id: u32,
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub hw_model: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub battery_level: Option<u32>,
    pub last_seen: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
}

/// Node directory persisted as JSON so names survive restarts.
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeDirectory {
    pub nodes: HashMap<u32, NodeEntry>,
    pub last_updated: DateTime<Utc>,
}

impl NodeDirectory {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Guard against leading NULs left by an interrupted write
        let cleaned = content.trim_start_matches('\0');
        let directory: NodeDirectory = serde_json::from_str(cleaned)?;
        Ok(directory)
    }

    /// Load the directory, starting empty when the file is missing or unreadable.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load_from_file(path.as_ref()) {
            Ok(dir) => dir,
            Err(e) => {
                debug!(
                    "node directory {} not loaded ({}); starting empty",
                    path.as_ref().display(),
                    e
                );
                Self::new()
            }
        }
    }

    /// Write atomically: temp file in the same directory, then rename over the target.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        use std::fs::{self as sfs, File, OpenOptions};
        use std::io::Write;
        let path_ref = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path_ref.parent() {
            let _ = sfs::create_dir_all(parent);
        }

        let dir = match path_ref.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let base = path_ref
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("nodes.json");
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    tmp.write_all(content.as_bytes())?;
                    tmp.flush()?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Failed to create temp file for atomic write: {}",
                        e
                    ))
                }
            }
        };

        sfs::rename(&tmp_path, path_ref)?;
        if let Ok(dir_file) = File::open(dir) {
            let _ = dir_file.sync_all();
        }
        Ok(())
    }

    /// Record or refresh a node from a `NODEINFO_APP` user record.
    pub fn update_node(&mut self, node_id: u32, user: &UserInfo) {
        let now = Utc::now();
        let short_name = user.short_name.trim().to_string();
        let long_name = user.long_name.trim().to_string();
        debug!(
            "node directory update {} short='{}' long='{}'",
            node_label(node_id),
            escape_log(&short_name),
            escape_log(&long_name)
        );
        self.nodes
            .entry(node_id)
            .and_modify(|n| {
                n.long_name = long_name.clone();
                n.short_name = short_name.clone();
                if user.hw_model.is_some() {
                    n.hw_model = user.hw_model.clone();
                }
                if user.role.is_some() {
                    n.role = user.role.clone();
                }
                n.last_seen = now;
            })
            .or_insert(NodeEntry {
                node_id,
                long_name,
                short_name,
                hw_model: user.hw_model.clone(),
                role: user.role.clone(),
                battery_level: None,
                last_seen: now,
                first_seen: now,
            });
        self.last_updated = now;
    }

    /// Record a battery reading from a `TELEMETRY_APP` packet. Unknown nodes get a stub entry.
    pub fn update_battery(&mut self, node_id: u32, level: u32) {
        let now = Utc::now();
        self.nodes
            .entry(node_id)
            .and_modify(|n| {
                n.battery_level = Some(level);
                n.last_seen = now;
            })
            .or_insert(NodeEntry {
                node_id,
                long_name: String::new(),
                short_name: String::new(),
                hw_model: None,
                role: None,
                battery_level: Some(level),
                last_seen: now,
                first_seen: now,
            });
        self.last_updated = now;
    }

    /// Resolve a node's short name; never fails, falls back to [`UNKNOWN_SHORT_NAME`].
    pub fn short_name_for(&self, node_id: u32) -> String {
        self.nodes
            .get(&node_id)
            .map(|n| n.short_name.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SHORT_NAME)
            .to_string()
    }

    pub fn get(&self, node_id: u32) -> Option<&NodeEntry> {
        self.nodes.get(&node_id)
    }

    /// Find nodes matching a user-typed recipient: node id, short name or long name
    /// (names case-insensitive). Results are sorted by node id.
    pub fn find_matches(&self, query: &str) -> Vec<&NodeEntry> {
        let q = query.trim();
        if q.is_empty() {
            return Vec::new();
        }
        if let Ok(id) = crate::validation::parse_node_id(q) {
            if let Some(entry) = self.nodes.get(&id) {
                return vec![entry];
            }
        }
        let mut found: Vec<&NodeEntry> = self
            .nodes
            .values()
            .filter(|n| n.short_name.eq_ignore_ascii_case(q) || n.long_name.eq_ignore_ascii_case(q))
            .collect();
        found.sort_by_key(|n| n.node_id);
        found
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for NodeDirectory {
    fn default() -> Self {
        Self::new()
    }
}

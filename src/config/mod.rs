//! # Configuration Management Module
//!
//! Typed TOML configuration for a tcbbs station.
//!
//! ## Configuration Structure
//!
//! - [`BbsConfig`] - Station name, conversation timeout, paging and field limits
//! - [`MeshConfig`] - Own node id, peer servers, allowed nodes
//! - [`StorageConfig`] - Data directory and node directory cache path
//! - [`LoggingConfig`] - Log level and optional log file
//! - [`Js8CallConfig`] - JS8Call menu settings (the bridge itself runs elsewhere)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tcbbs::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("BBS Name: {}", config.bbs.name);
//!     println!("Peers: {:?}", config.mesh.peers);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bbs]
//! name = "TC2 Mesh BBS"
//! conversation_timeout = 10
//! page_size = 5
//! max_field_length = 200
//!
//! [mesh]
//! node_id = "!a1b2c3d4"
//! peers = ["!11223344", "!55667788"]
//! allowed_nodes = []
//!
//! [storage]
//! data_dir = "./data"
//! ```
//!
//! Node ids accept decimal, `0x` hex or `!` hex notation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::fs;

use crate::validation::parse_node_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsConfig {
    pub name: String,
    /// Minutes of inactivity after which a user's menu position is forgotten.
    #[serde(default = "default_conversation_timeout")]
    pub conversation_timeout: u32,
    /// Entries shown per page when listing mail or bulletins.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Upper bound in bytes for a single user-entered field (subject, body, url).
    #[serde(default = "default_max_field_length")]
    pub max_field_length: usize,
}

fn default_conversation_timeout() -> u32 {
    10
}

fn default_page_size() -> usize {
    5
}

fn default_max_field_length() -> usize {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    /// This server's own node number. Direct messages must be addressed to it.
    pub node_id: String,
    /// Peer BBS servers trusted as sources of sync frames and targets for replication.
    #[serde(default, alias = "bbs_nodes")]
    pub peers: Vec<String>,
    /// When non-empty, only these nodes may use the menu interface.
    #[serde(default)]
    pub allowed_nodes: Vec<String>,
    #[serde(default)]
    pub channel: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Node directory cache file; defaults to `<data_dir>/nodes.json`.
    #[serde(default)]
    pub node_directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Js8CallConfig {
    /// Whether a JS8Call bridge is feeding the store. When false the menu reports it unconfigured.
    #[serde(default)]
    pub enabled: bool,
    /// Group callsigns (e.g. `@HB`) whose traffic is listed under group messages.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Group callsigns whose traffic is flagged urgent.
    #[serde(default)]
    pub urgent: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bbs: BbsConfig,
    pub mesh: MeshConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub js8call: Js8CallConfig,
}

/// Parsed node numbers derived from [`MeshConfig`], resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshIdentity {
    pub own_node: u32,
    pub peers: HashSet<u32>,
    pub allowed: HashSet<u32>,
}

impl MeshConfig {
    pub fn identity(&self) -> Result<MeshIdentity> {
        let own_node = parse_node_id(&self.node_id)
            .map_err(|e| anyhow!("mesh.node_id: {}", e))?;
        let peers = self
            .peers
            .iter()
            .map(|p| parse_node_id(p).map_err(|e| anyhow!("mesh.peers: {}", e)))
            .collect::<Result<HashSet<_>>>()?;
        let allowed = self
            .allowed_nodes
            .iter()
            .map(|p| parse_node_id(p).map_err(|e| anyhow!("mesh.allowed_nodes: {}", e)))
            .collect::<Result<HashSet<_>>>()?;
        Ok(MeshIdentity {
            own_node,
            peers,
            allowed,
        })
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let identity = self.mesh.identity()?;
        if identity.peers.contains(&identity.own_node) {
            return Err(anyhow!("mesh.peers must not contain this server's own node id"));
        }
        if self.bbs.page_size == 0 {
            return Err(anyhow!("bbs.page_size must be at least 1"));
        }
        if self.bbs.max_field_length < 16 {
            return Err(anyhow!("bbs.max_field_length must be at least 16 bytes"));
        }
        Ok(())
    }

    /// Path of the node directory cache file.
    pub fn node_directory_path(&self) -> String {
        self.storage
            .node_directory
            .clone()
            .unwrap_or_else(|| format!("{}/nodes.json", self.storage.data_dir))
    }

    /// Path of the sled database holding mail, bulletins and channels.
    pub fn store_path(&self) -> String {
        format!("{}/bbs.sled", self.storage.data_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bbs: BbsConfig {
                name: "TC2 Mesh BBS".to_string(),
                conversation_timeout: default_conversation_timeout(),
                page_size: default_page_size(),
                max_field_length: default_max_field_length(),
            },
            mesh: MeshConfig {
                node_id: "!00000001".to_string(),
                peers: Vec::new(),
                allowed_nodes: Vec::new(),
                channel: 0,
            },
            storage: StorageConfig {
                data_dir: "./data".to_string(),
                node_directory: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("tcbbs.log".to_string()),
                security_file: Some("tcbbs-security.log".to_string()),
            },
            js8call: Js8CallConfig::default(),
        }
    }
}

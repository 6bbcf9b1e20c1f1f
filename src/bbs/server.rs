use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use tokio::sync::mpsc;
use tokio::time::Duration;

use super::addressing::{classify, Route, TextPacket};
use super::conversation::{ConversationEngine, EngineContext};
use super::state::ConversationState;
use super::{js8, sync};
use crate::config::{Config, MeshIdentity};
use crate::logutil::{escape_log, node_label};
use crate::mesh::{InboundEvent, Js8Report, MeshPacket, NodeDirectory, OutgoingMessage, PortNum};
use crate::storage::{BbsStore, BbsStoreBuilder};

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

/// Interval between housekeeping passes (expired conversations, node directory save).
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// # BBS Server - Dispatch Router
///
/// Owns the store, the node directory and the conversation engine, and turns
/// each inbound [`MeshPacket`] into outbound [`OutgoingMessage`]s.
///
/// ## Packet Handling
///
/// 1. `NODEINFO_APP` / `TELEMETRY_APP` packets refresh the node directory
/// 2. Text packets are classified by the addressing filter
/// 3. Sync frames from peers go to the replication interpreter
/// 4. Commands addressed to this node go to the conversation engine
///
/// JS8Call reports relayed by the bridge are filed into the store for the
/// JS8 menu.
///
/// [`BbsServer::handle_packet`] is the failure boundary: anything that goes
/// wrong for one packet is logged and the server moves on to the next.
///
/// ## Usage
///
/// ```rust,no_run
/// use tcbbs::bbs::BbsServer;
/// use tcbbs::config::Config;
/// use tokio::sync::mpsc;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = Config::load("config.toml").await?;
///     let mut server = BbsServer::new(config).await?;
///     let (_event_tx, event_rx) = mpsc::unbounded_channel();
///     let (outgoing_tx, _outgoing_rx) = mpsc::unbounded_channel();
///     server.attach_transport(event_rx, outgoing_tx);
///     server.run().await
/// }
/// ```
pub struct BbsServer {
    config: Config,
    identity: MeshIdentity,
    store: BbsStore,
    directory: NodeDirectory,
    directory_path: String,
    directory_dirty: bool,
    engine: ConversationEngine,
    inbound_rx: Option<mpsc::UnboundedReceiver<InboundEvent>>,
    outgoing_tx: Option<mpsc::UnboundedSender<OutgoingMessage>>,
}

impl BbsServer {
    /// Open the store and load the node directory for `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let identity = config.mesh.identity()?;
        tokio::fs::create_dir_all(&config.storage.data_dir)
            .await
            .map_err(|e| anyhow!("Failed to create data dir {}: {}", config.storage.data_dir, e))?;
        let store = BbsStoreBuilder::new(config.store_path()).open()?;
        let directory_path = config.node_directory_path();
        let directory = NodeDirectory::load_or_default(&directory_path);
        info!(
            "Loaded {} nodes from {}; {} peers configured",
            directory.len(),
            directory_path,
            identity.peers.len()
        );
        let engine = ConversationEngine::new(config.bbs.conversation_timeout);
        Ok(Self {
            config,
            identity,
            store,
            directory,
            directory_path,
            directory_dirty: false,
            engine,
            inbound_rx: None,
            outgoing_tx: None,
        })
    }

    /// Wire the server to a transport: events in, messages out.
    pub fn attach_transport(
        &mut self,
        inbound_rx: mpsc::UnboundedReceiver<InboundEvent>,
        outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    ) {
        self.inbound_rx = Some(inbound_rx);
        self.outgoing_tx = Some(outgoing_tx);
    }

    #[doc(hidden)]
    pub fn test_set_outgoing(&mut self, tx: mpsc::UnboundedSender<OutgoingMessage>) {
        self.outgoing_tx = Some(tx);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &BbsStore {
        &self.store
    }

    pub fn directory(&self) -> &NodeDirectory {
        &self.directory
    }

    pub fn conversation_state(&self, node: u32) -> Option<&ConversationState> {
        self.engine.state(node)
    }

    /// Handle one bridge event. Never fails; errors are logged and dropped.
    pub async fn handle_event(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Packet(packet) => self.handle_packet(packet).await,
            InboundEvent::Js8 { js8 } => self.record_js8(&js8),
        }
    }

    fn record_js8(&mut self, report: &Js8Report) {
        if let Err(e) = js8::record(report, &self.store, &self.config.js8call) {
            error!(
                "Error recording JS8 message from {}: {}",
                escape_log(&report.sender),
                e
            );
        }
    }

    /// Handle one inbound packet. Never fails; errors are logged and dropped.
    pub async fn handle_packet(&mut self, packet: MeshPacket) {
        if let Err(e) = self.process_packet(&packet).await {
            let text = packet
                .decoded
                .as_ref()
                .and_then(|d| d.text.as_deref())
                .unwrap_or("");
            error!(
                "Error processing packet from {}: {} (payload '{}')",
                packet
                    .from_id
                    .clone()
                    .or_else(|| packet.from.map(node_label))
                    .unwrap_or_else(|| "?".to_string()),
                e,
                escape_log(text)
            );
        }
    }

    async fn process_packet(&mut self, packet: &MeshPacket) -> Result<()> {
        match packet.portnum() {
            Some(PortNum::NodeinfoApp) => {
                self.record_node_info(packet);
                return Ok(());
            }
            Some(PortNum::TelemetryApp) => {
                self.record_telemetry(packet);
                return Ok(());
            }
            Some(PortNum::Other) => {
                trace!("Ignoring packet on unhandled port from {:?}", packet.from);
                return Ok(());
            }
            Some(PortNum::TextMessageApp) | None => {}
        }

        let text = TextPacket::try_from(packet)?;
        let sender_short = self.directory.short_name_for(text.from);
        let receiver = match text.to {
            Some(to) if !super::addressing::is_group_destination(text.to) => {
                self.directory.short_name_for(to)
            }
            _ => "Group Chat".to_string(),
        };
        info!(
            "Received message from '{}' ({}) to {}: {}",
            escape_log(&sender_short),
            text.from_id,
            receiver,
            escape_log(&text.text)
        );

        match classify(&text, &self.identity) {
            Route::Sync => {
                let channel = self.config.mesh.channel;
                let out = sync::interpret(&text.text, text.from, &self.store, channel)?;
                self.dispatch(out);
            }
            Route::Command => {
                let allowed = &self.identity.allowed;
                if !allowed.is_empty() && !allowed.contains(&text.from) {
                    sec_log!(
                        "Refused command from {} ({}) not in allowed_nodes: '{}'",
                        text.from_id,
                        escape_log(&sender_short),
                        escape_log(&text.text)
                    );
                    return Ok(());
                }
                let ctx = EngineContext {
                    store: &self.store,
                    directory: &self.directory,
                    identity: &self.identity,
                    config: &self.config,
                };
                let out = self.engine.handle(&ctx, text.from, &sender_short, &text.text)?;
                self.dispatch(out);
            }
            Route::Ignore => {
                if self.identity.peers.contains(&text.from) {
                    debug!("Ignoring non-sync message from peer {}", text.from_id);
                } else {
                    debug!("Ignoring group or foreign message from {}", text.from_id);
                }
            }
        }
        Ok(())
    }

    fn record_node_info(&mut self, packet: &MeshPacket) {
        let (Some(from), Some(user)) = (
            packet.from,
            packet.decoded.as_ref().and_then(|d| d.user.as_ref()),
        ) else {
            debug!("NODEINFO packet without sender or user record");
            return;
        };
        self.directory.update_node(from, user);
        self.directory_dirty = true;
    }

    fn record_telemetry(&mut self, packet: &MeshPacket) {
        let level = packet
            .decoded
            .as_ref()
            .and_then(|d| d.telemetry.as_ref())
            .and_then(|t| t.device_metrics.as_ref())
            .and_then(|m| m.battery_level);
        if let (Some(from), Some(level)) = (packet.from, level) {
            trace!("battery {}% for {}", level, node_label(from));
            self.directory.update_battery(from, level);
            self.directory_dirty = true;
        }
    }

    /// Queue messages for the transport writer.
    fn dispatch(&self, messages: Vec<OutgoingMessage>) {
        let Some(tx) = self.outgoing_tx.as_ref() else {
            if !messages.is_empty() {
                warn!("No transport attached; dropping {} outgoing messages", messages.len());
            }
            return;
        };
        for msg in messages {
            let target = match msg.to_node {
                Some(node) if !msg.is_broadcast() => node_label(node),
                _ => "broadcast".to_string(),
            };
            debug!("Queued message to {}: {}", target, escape_log(&msg.content));
            if tx.send(msg).is_err() {
                warn!("Outgoing channel closed; message to {} dropped", target);
            }
        }
    }

    fn save_directory_if_dirty(&mut self) {
        if !self.directory_dirty {
            return;
        }
        match self.directory.save_to_file(&self.directory_path) {
            Ok(()) => {
                self.directory_dirty = false;
                debug!("Saved {} nodes to {}", self.directory.len(), self.directory_path);
            }
            Err(e) => warn!("Failed to save node directory {}: {}", self.directory_path, e),
        }
    }

    /// Main loop: handle packets in arrival order until ctrl-c or transport close.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "BBS '{}' running as {}",
            self.config.bbs.name,
            node_label(self.identity.own_node)
        );
        let mut inbound = self
            .inbound_rx
            .take()
            .ok_or_else(|| anyhow!("No transport attached"))?;
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = inbound.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("Transport closed");
                            break;
                        }
                    }
                }
                _ = housekeeping.tick() => {
                    let pruned = self.engine.prune_expired();
                    if pruned > 0 {
                        debug!("Pruned {} expired conversations", pruned);
                    }
                    self.save_directory_if_dirty();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        drop(inbound);
        self.shutdown().await
    }

    /// Close the outgoing channel and flush persistent state.
    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down BBS server");
        self.inbound_rx = None;
        self.outgoing_tx = None;
        self.store.flush()?;
        self.directory_dirty = true;
        self.save_directory_if_dirty();
        info!(
            "Shutdown complete ({} conversations dropped)",
            self.engine.active_conversations()
        );
        Ok(())
    }

    /// Print store counts and peer configuration.
    pub async fn show_status(&self) -> Result<()> {
        let stats = self.store.stats();
        println!("BBS Status:");
        println!("  Name: {}", self.config.bbs.name);
        println!("  Node: {}", node_label(self.identity.own_node));
        println!("  Mail messages: {}", stats.mail);
        println!("  Bulletins: {}", stats.bulletins);
        println!("  Channels: {}", stats.channels);
        println!("  JS8 messages: {}", stats.js8);
        println!("  Known nodes: {}", self.directory.len());
        let mut peers: Vec<u32> = self.identity.peers.iter().copied().collect();
        peers.sort_unstable();
        if peers.is_empty() {
            println!("  Peers: none");
        } else {
            let labels: Vec<String> = peers.into_iter().map(node_label).collect();
            println!("  Peers: {}", labels.join(", "));
        }
        Ok(())
    }
}

//! Peer replication frames.
//!
//! Servers replicate local mutations by sending pipe-delimited frames to every
//! configured peer as direct text messages:
//!
//! | Frame             | Fields                                                   |
//! |-------------------|----------------------------------------------------------|
//! | `BULLETIN`        | board, sender short name, subject, body, unique id       |
//! | `MAIL`            | sender id, sender short name, recipient id, subject, body, unique id |
//! | `DELETE_BULLETIN` | unique id                                                |
//! | `DELETE_MAIL`     | unique id                                                |
//! | `CHANNEL`         | name, url                                                |
//!
//! Applying a frame is idempotent: inserts are keyed by unique id and deletes
//! of missing records are no-ops. A malformed frame is logged and dropped by
//! [`interpret`]; only storage failures reach the caller.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, warn};
use thiserror::Error;

use crate::logutil::{node_label, preview};
use crate::mesh::OutgoingMessage;
use crate::storage::types::is_urgent_board;
use crate::storage::{BbsStore, StorageError};
use crate::validation::parse_node_id;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("unknown frame tag '{0}'")]
    UnknownTag(String),
    #[error("{tag} frame expects {expected} fields, got {found}")]
    FieldCount {
        tag: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{tag} frame has an empty {field}")]
    EmptyField {
        tag: &'static str,
        field: &'static str,
    },
    #[error("{tag} frame has an invalid node id '{value}'")]
    BadNodeId { tag: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncFrame {
    Bulletin {
        board: String,
        sender_short_name: String,
        subject: String,
        body: String,
        unique_id: String,
    },
    Mail {
        sender_id: u32,
        sender_short_name: String,
        recipient_id: u32,
        subject: String,
        body: String,
        unique_id: String,
    },
    DeleteBulletin {
        unique_id: String,
    },
    DeleteMail {
        unique_id: String,
    },
    Channel {
        name: String,
        url: String,
    },
}

impl SyncFrame {
    pub fn tag(&self) -> &'static str {
        match self {
            SyncFrame::Bulletin { .. } => "BULLETIN",
            SyncFrame::Mail { .. } => "MAIL",
            SyncFrame::DeleteBulletin { .. } => "DELETE_BULLETIN",
            SyncFrame::DeleteMail { .. } => "DELETE_MAIL",
            SyncFrame::Channel { .. } => "CHANNEL",
        }
    }
}

fn expect_fields(tag: &'static str, fields: &[&str], expected: usize) -> Result<(), FrameError> {
    if fields.len() != expected {
        return Err(FrameError::FieldCount {
            tag,
            expected,
            found: fields.len(),
        });
    }
    Ok(())
}

fn non_empty(tag: &'static str, field: &'static str, value: &str) -> Result<String, FrameError> {
    if value.trim().is_empty() {
        return Err(FrameError::EmptyField { tag, field });
    }
    Ok(value.to_string())
}

fn node_field(tag: &'static str, value: &str) -> Result<u32, FrameError> {
    parse_node_id(value).map_err(|_| FrameError::BadNodeId {
        tag,
        value: value.to_string(),
    })
}

impl FromStr for SyncFrame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return Err(FrameError::Empty);
        }
        let parts: Vec<&str> = text.split('|').collect();
        let (head, fields) = parts.split_at(1);
        match head[0] {
            "BULLETIN" => {
                let tag = "BULLETIN";
                expect_fields(tag, fields, 5)?;
                Ok(SyncFrame::Bulletin {
                    board: non_empty(tag, "board", fields[0])?,
                    sender_short_name: fields[1].to_string(),
                    subject: fields[2].to_string(),
                    body: fields[3].to_string(),
                    unique_id: non_empty(tag, "unique id", fields[4])?,
                })
            }
            "MAIL" => {
                let tag = "MAIL";
                expect_fields(tag, fields, 6)?;
                Ok(SyncFrame::Mail {
                    sender_id: node_field(tag, fields[0])?,
                    sender_short_name: fields[1].to_string(),
                    recipient_id: node_field(tag, fields[2])?,
                    subject: fields[3].to_string(),
                    body: fields[4].to_string(),
                    unique_id: non_empty(tag, "unique id", fields[5])?,
                })
            }
            "DELETE_BULLETIN" => {
                let tag = "DELETE_BULLETIN";
                expect_fields(tag, fields, 1)?;
                Ok(SyncFrame::DeleteBulletin {
                    unique_id: non_empty(tag, "unique id", fields[0])?,
                })
            }
            "DELETE_MAIL" => {
                let tag = "DELETE_MAIL";
                expect_fields(tag, fields, 1)?;
                Ok(SyncFrame::DeleteMail {
                    unique_id: non_empty(tag, "unique id", fields[0])?,
                })
            }
            "CHANNEL" => {
                let tag = "CHANNEL";
                expect_fields(tag, fields, 2)?;
                Ok(SyncFrame::Channel {
                    name: non_empty(tag, "name", fields[0])?,
                    url: fields[1].to_string(),
                })
            }
            other => Err(FrameError::UnknownTag(other.to_string())),
        }
    }
}

impl fmt::Display for SyncFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncFrame::Bulletin {
                board,
                sender_short_name,
                subject,
                body,
                unique_id,
            } => write!(
                f,
                "BULLETIN|{}|{}|{}|{}|{}",
                board, sender_short_name, subject, body, unique_id
            ),
            SyncFrame::Mail {
                sender_id,
                sender_short_name,
                recipient_id,
                subject,
                body,
                unique_id,
            } => write!(
                f,
                "MAIL|{}|{}|{}|{}|{}|{}",
                sender_id, sender_short_name, recipient_id, subject, body, unique_id
            ),
            SyncFrame::DeleteBulletin { unique_id } => write!(f, "DELETE_BULLETIN|{}", unique_id),
            SyncFrame::DeleteMail { unique_id } => write!(f, "DELETE_MAIL|{}", unique_id),
            SyncFrame::Channel { name, url } => write!(f, "CHANNEL|{}|{}", name, url),
        }
    }
}

/// Broadcast text announcing a new urgent bulletin.
pub fn urgent_notification(sender_short_name: &str, subject: &str) -> String {
    format!(
        "💥NEW URGENT BULLETIN💥\nFrom: {}\nTitle: {}",
        sender_short_name, subject
    )
}

/// One direct message per peer carrying `frame`, in ascending node order.
pub fn peer_fanout<'a, I>(frame: &SyncFrame, peers: I, channel: u32) -> Vec<OutgoingMessage>
where
    I: IntoIterator<Item = &'a u32>,
{
    let mut targets: Vec<u32> = peers.into_iter().copied().collect();
    targets.sort_unstable();
    let text = frame.to_string();
    targets
        .into_iter()
        .map(|peer| OutgoingMessage::direct(peer, channel, text.clone()))
        .collect()
}

/// Apply a parsed frame to the store. Returns the broadcasts it triggers.
pub fn apply_frame(
    frame: &SyncFrame,
    store: &BbsStore,
    channel: u32,
) -> Result<Vec<OutgoingMessage>, StorageError> {
    let mut out = Vec::new();
    match frame {
        SyncFrame::Bulletin {
            board,
            sender_short_name,
            subject,
            body,
            unique_id,
        } => {
            let created =
                store.upsert_bulletin(board, sender_short_name, subject, body, unique_id)?;
            debug!("sync bulletin {} on {} created={}", unique_id, board, created);
            if created && is_urgent_board(board) {
                out.push(OutgoingMessage::broadcast(
                    channel,
                    urgent_notification(sender_short_name, subject),
                ));
            }
        }
        SyncFrame::Mail {
            sender_id,
            sender_short_name,
            recipient_id,
            subject,
            body,
            unique_id,
        } => {
            let created = store.upsert_mail(
                *sender_id,
                sender_short_name,
                *recipient_id,
                subject,
                body,
                unique_id,
            )?;
            debug!(
                "sync mail {} for {} created={}",
                unique_id,
                node_label(*recipient_id),
                created
            );
        }
        SyncFrame::DeleteBulletin { unique_id } => {
            let removed = store.delete_bulletin(unique_id)?;
            debug!("sync delete bulletin {} removed={}", unique_id, removed);
        }
        SyncFrame::DeleteMail { unique_id } => match store.find_mail_recipient(unique_id)? {
            Some(recipient) => {
                let removed = store.delete_mail(unique_id, recipient)?;
                debug!("sync delete mail {} removed={}", unique_id, removed);
            }
            None => debug!("sync delete mail {}: not stored", unique_id),
        },
        SyncFrame::Channel { name, url } => {
            let changed = store.upsert_channel(name, url)?;
            debug!("sync channel {} changed={}", name, changed);
        }
    }
    Ok(out)
}

/// Parse and apply one sync payload from `peer`. Malformed frames are dropped.
pub fn interpret(
    text: &str,
    peer: u32,
    store: &BbsStore,
    channel: u32,
) -> Result<Vec<OutgoingMessage>, StorageError> {
    let frame = match text.parse::<SyncFrame>() {
        Ok(frame) => frame,
        Err(e) => {
            warn!(
                "Dropping malformed sync frame from {}: {} ({})",
                node_label(peer),
                e,
                preview(text, 120)
            );
            return Ok(Vec::new());
        }
    };
    info!("Applying {} frame from {}", frame.tag(), node_label(peer));
    apply_frame(&frame, store, channel)
}

//! Records persisted by [`super::BbsStore`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAIL_SCHEMA_VERSION: u8 = 1;
pub const BULLETIN_SCHEMA_VERSION: u8 = 1;
pub const CHANNEL_SCHEMA_VERSION: u8 = 1;

/// One mailbox entry. `unique_id` is shared by every replica of this mail;
/// `seq` is the local display number and differs between servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailMessage {
    pub unique_id: String,
    pub seq: u64,
    pub sender_id: u32,
    pub sender_short_name: String,
    pub recipient_id: u32,
    pub subject: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// A post on one of the bulletin boards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bulletin {
    pub unique_id: String,
    pub seq: u64,
    pub board: String,
    pub sender_short_name: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub schema_version: u8,
}

/// Channel directory entry, keyed by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub name: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub schema_version: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Js8Kind {
    Group,
    Station,
    Urgent,
}

/// A JS8Call message recorded by the bridge for display in the JS8 menu.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Js8Message {
    pub sender: String,
    pub receiver: String,
    pub text: String,
    pub kind: Js8Kind,
    pub received_at: DateTime<Utc>,
}

/// The fixed boards offered by the bulletin menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Board {
    General,
    Info,
    News,
    Urgent,
}

impl Board {
    pub const ALL: [Board; 4] = [Board::General, Board::Info, Board::News, Board::Urgent];

    pub fn name(self) -> &'static str {
        match self {
            Board::General => "General",
            Board::Info => "Info",
            Board::News => "News",
            Board::Urgent => "Urgent",
        }
    }

    pub fn from_name(name: &str) -> Option<Board> {
        Board::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Whether a board name denotes the urgent board (case-insensitive).
pub fn is_urgent_board(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(Board::Urgent.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_names_are_case_insensitive() {
        assert_eq!(Board::from_name("urgent"), Some(Board::Urgent));
        assert_eq!(Board::from_name(" NEWS "), Some(Board::News));
        assert_eq!(Board::from_name("Swap Meet"), None);
        assert!(is_urgent_board("URGENT"));
        assert!(!is_urgent_board("General"));
    }
}

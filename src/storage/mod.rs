//! # Storage Module - Persistence Gateway
//!
//! Sled-backed persistence for mail, bulletins, the channel directory and
//! JS8Call traffic recorded by an external bridge.
//!
//! ## Idempotency
//!
//! Mail and bulletins are keyed by their replication `unique_id`. Inserts use
//! sled's compare-and-swap against an absent key, so re-applying the same
//! insert (a duplicated sync frame, a mesh rebroadcast) leaves the tree
//! untouched. Deletes of an absent id return `Ok(false)` rather than an error.
//! Each mutation is a single keyed operation; nothing spans trees.
//!
//! ## Layout
//!
//! ```text
//! bbs.sled/
//! ├── mail        ← unique_id → MailMessage (bincode)
//! ├── bulletins   ← unique_id → Bulletin
//! ├── channels    ← name → Channel
//! ├── js8         ← <nanos> → Js8Message
//! └── meta        ← seq:<kind> → u64 display counters
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tcbbs::storage::BbsStoreBuilder;
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = BbsStoreBuilder::new("./data/bbs.sled").open()?;
//!     store.upsert_bulletin("General", "ALC", "Hello", "First post", "uid-1")?;
//!     let posts = store.list_bulletins("General")?;
//!     assert_eq!(posts.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod types;

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::debug;
use sled::IVec;

pub use errors::StorageError;
pub use types::{Board, Bulletin, Channel, Js8Kind, Js8Message, MailMessage};
use types::{BULLETIN_SCHEMA_VERSION, CHANNEL_SCHEMA_VERSION, MAIL_SCHEMA_VERSION};

const TREE_MAIL: &str = "mail";
const TREE_BULLETINS: &str = "bulletins";
const TREE_CHANNELS: &str = "channels";
const TREE_JS8: &str = "js8";
const TREE_META: &str = "meta";

fn next_timestamp_nanos() -> i64 {
    let now = Utc::now();
    now.timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000)
}

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct BbsStoreBuilder {
    path: PathBuf,
}

impl BbsStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open(self) -> Result<BbsStore, StorageError> {
        BbsStore::open(self.path)
    }
}

/// Counts reported by `status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub mail: usize,
    pub bulletins: usize,
    pub channels: usize,
    pub js8: usize,
}

/// Sled-backed persistence gateway.
pub struct BbsStore {
    db: sled::Db,
    mail: sled::Tree,
    bulletins: sled::Tree,
    channels: sled::Tree,
    js8: sled::Tree,
    meta: sled::Tree,
}

impl BbsStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let mail = db.open_tree(TREE_MAIL)?;
        let bulletins = db.open_tree(TREE_BULLETINS)?;
        let channels = db.open_tree(TREE_CHANNELS)?;
        let js8 = db.open_tree(TREE_JS8)?;
        let meta = db.open_tree(TREE_META)?;
        Ok(Self {
            db,
            mail,
            bulletins,
            channels,
            js8,
            meta,
        })
    }

    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        Ok(bincode::serialize(value)?)
    }

    fn deserialize<T: serde::de::DeserializeOwned>(bytes: &IVec) -> Result<T, StorageError> {
        Ok(bincode::deserialize::<T>(bytes)?)
    }

    fn check_schema(entity: &'static str, expected: u8, found: u8) -> Result<(), StorageError> {
        if expected != found {
            return Err(StorageError::SchemaMismatch {
                entity,
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Bump and return the local display counter for `kind`.
    fn next_seq(&self, kind: &str) -> Result<u64, StorageError> {
        let key = format!("seq:{}", kind);
        let updated = self.meta.update_and_fetch(key.as_bytes(), |old| {
            let current = old
                .and_then(|b| <[u8; 8]>::try_from(b).ok())
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;
        let bytes = updated.ok_or_else(|| StorageError::CorruptCounter(key.clone()))?;
        let arr = <[u8; 8]>::try_from(bytes.as_ref())
            .map_err(|_| StorageError::CorruptCounter(key.clone()))?;
        Ok(u64::from_be_bytes(arr))
    }

    /// Insert `bytes` under `key` only if the key is absent. Returns whether it was inserted.
    fn insert_if_absent(
        tree: &sled::Tree,
        key: &[u8],
        bytes: Vec<u8>,
    ) -> Result<bool, StorageError> {
        let outcome = tree.compare_and_swap(key, None::<&[u8]>, Some(bytes))?;
        if outcome.is_ok() {
            tree.flush()?;
        }
        Ok(outcome.is_ok())
    }

    // ----- mail -----

    /// Insert a mail unless one with `unique_id` already exists. Returns `true` when created.
    pub fn upsert_mail(
        &self,
        sender_id: u32,
        sender_short_name: &str,
        recipient_id: u32,
        subject: &str,
        body: &str,
        unique_id: &str,
    ) -> Result<bool, StorageError> {
        if self.mail.contains_key(unique_id.as_bytes())? {
            debug!("mail {} already stored; insert skipped", unique_id);
            return Ok(false);
        }
        let record = MailMessage {
            unique_id: unique_id.to_string(),
            seq: self.next_seq(TREE_MAIL)?,
            sender_id,
            sender_short_name: sender_short_name.to_string(),
            recipient_id,
            subject: subject.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
            schema_version: MAIL_SCHEMA_VERSION,
        };
        let bytes = Self::serialize(&record)?;
        Self::insert_if_absent(&self.mail, unique_id.as_bytes(), bytes)
    }

    pub fn get_mail(&self, unique_id: &str) -> Result<Option<MailMessage>, StorageError> {
        let Some(bytes) = self.mail.get(unique_id.as_bytes())? else {
            return Ok(None);
        };
        let record: MailMessage = Self::deserialize(&bytes)?;
        Self::check_schema("mail", MAIL_SCHEMA_VERSION, record.schema_version)?;
        Ok(Some(record))
    }

    /// Recipient of the mail with `unique_id`, if such a mail is stored.
    pub fn find_mail_recipient(&self, unique_id: &str) -> Result<Option<u32>, StorageError> {
        Ok(self.get_mail(unique_id)?.map(|m| m.recipient_id))
    }

    /// Delete the mail when it exists and belongs to `recipient_id`.
    /// Returns whether anything was removed.
    pub fn delete_mail(&self, unique_id: &str, recipient_id: u32) -> Result<bool, StorageError> {
        match self.get_mail(unique_id)? {
            Some(m) if m.recipient_id == recipient_id => {
                let removed = self.mail.remove(unique_id.as_bytes())?.is_some();
                self.mail.flush()?;
                Ok(removed)
            }
            Some(m) => {
                debug!(
                    "mail {} belongs to {} not {}; delete skipped",
                    unique_id, m.recipient_id, recipient_id
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    pub fn mark_mail_read(&self, unique_id: &str) -> Result<bool, StorageError> {
        let Some(mut record) = self.get_mail(unique_id)? else {
            return Ok(false);
        };
        if record.read {
            return Ok(true);
        }
        record.read = true;
        self.mail.insert(unique_id.as_bytes(), Self::serialize(&record)?)?;
        self.mail.flush()?;
        Ok(true)
    }

    /// All mail addressed to `recipient_id`, newest first.
    pub fn list_mail_for(&self, recipient_id: u32) -> Result<Vec<MailMessage>, StorageError> {
        let mut out = Vec::new();
        for entry in self.mail.iter() {
            let (_, value) = entry?;
            let record: MailMessage = Self::deserialize(&value)?;
            if record.recipient_id == recipient_id {
                Self::check_schema("mail", MAIL_SCHEMA_VERSION, record.schema_version)?;
                out.push(record);
            }
        }
        out.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(out)
    }

    /// Look up one of `recipient_id`'s mails by its local display number.
    pub fn get_mail_by_seq(
        &self,
        recipient_id: u32,
        seq: u64,
    ) -> Result<Option<MailMessage>, StorageError> {
        Ok(self
            .list_mail_for(recipient_id)?
            .into_iter()
            .find(|m| m.seq == seq))
    }

    // ----- bulletins -----

    /// Insert a bulletin unless one with `unique_id` already exists. Returns `true` when created.
    pub fn upsert_bulletin(
        &self,
        board: &str,
        sender_short_name: &str,
        subject: &str,
        body: &str,
        unique_id: &str,
    ) -> Result<bool, StorageError> {
        if self.bulletins.contains_key(unique_id.as_bytes())? {
            debug!("bulletin {} already stored; insert skipped", unique_id);
            return Ok(false);
        }
        let record = Bulletin {
            unique_id: unique_id.to_string(),
            seq: self.next_seq(TREE_BULLETINS)?,
            board: board.to_string(),
            sender_short_name: sender_short_name.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
            schema_version: BULLETIN_SCHEMA_VERSION,
        };
        let bytes = Self::serialize(&record)?;
        Self::insert_if_absent(&self.bulletins, unique_id.as_bytes(), bytes)
    }

    pub fn delete_bulletin(&self, unique_id: &str) -> Result<bool, StorageError> {
        let removed = self.bulletins.remove(unique_id.as_bytes())?.is_some();
        if removed {
            self.bulletins.flush()?;
        }
        Ok(removed)
    }

    /// Bulletins on `board` (case-insensitive), newest first.
    pub fn list_bulletins(&self, board: &str) -> Result<Vec<Bulletin>, StorageError> {
        let mut out = Vec::new();
        for entry in self.bulletins.iter() {
            let (_, value) = entry?;
            let record: Bulletin = Self::deserialize(&value)?;
            if record.board.eq_ignore_ascii_case(board.trim()) {
                Self::check_schema("bulletin", BULLETIN_SCHEMA_VERSION, record.schema_version)?;
                out.push(record);
            }
        }
        out.sort_by(|a, b| b.seq.cmp(&a.seq));
        Ok(out)
    }

    pub fn get_bulletin_by_seq(
        &self,
        board: &str,
        seq: u64,
    ) -> Result<Option<Bulletin>, StorageError> {
        Ok(self.list_bulletins(board)?.into_iter().find(|b| b.seq == seq))
    }

    // ----- channels -----

    /// Insert or update a channel. Returns `true` when the stored state changed.
    pub fn upsert_channel(&self, name: &str, url: &str) -> Result<bool, StorageError> {
        if let Some(bytes) = self.channels.get(name.as_bytes())? {
            let existing: Channel = Self::deserialize(&bytes)?;
            if existing.url == url {
                return Ok(false);
            }
        }
        let record = Channel {
            name: name.to_string(),
            url: url.to_string(),
            updated_at: Utc::now(),
            schema_version: CHANNEL_SCHEMA_VERSION,
        };
        self.channels.insert(name.as_bytes(), Self::serialize(&record)?)?;
        self.channels.flush()?;
        Ok(true)
    }

    /// All channels ordered by name.
    pub fn list_channels(&self) -> Result<Vec<Channel>, StorageError> {
        self.channels
            .iter()
            .map(|entry| {
                let (_, value) = entry?;
                let record: Channel = Self::deserialize(&value)?;
                Self::check_schema("channel", CHANNEL_SCHEMA_VERSION, record.schema_version)?;
                Ok(record)
            })
            .collect()
    }

    // ----- js8 -----

    /// Record a JS8Call message. Called by the bridge, never by sync frames.
    pub fn record_js8_message(&self, message: &Js8Message) -> Result<(), StorageError> {
        let key = format!("{:020}", next_timestamp_nanos());
        self.js8.insert(key.as_bytes(), Self::serialize(message)?)?;
        self.js8.flush()?;
        Ok(())
    }

    /// Most recent JS8 messages of `kind`, optionally restricted to one receiver, newest first.
    pub fn list_js8(
        &self,
        kind: Js8Kind,
        receiver: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Js8Message>, StorageError> {
        let mut out = Vec::new();
        for entry in self.js8.iter().rev() {
            let (_, value) = entry?;
            let record: Js8Message = Self::deserialize(&value)?;
            if record.kind != kind {
                continue;
            }
            if let Some(r) = receiver {
                if !record.receiver.eq_ignore_ascii_case(r) {
                    continue;
                }
            }
            out.push(record);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Distinct receivers of group traffic, sorted.
    pub fn js8_groups(&self) -> Result<Vec<String>, StorageError> {
        let mut groups = Vec::new();
        for entry in self.js8.iter() {
            let (_, value) = entry?;
            let record: Js8Message = Self::deserialize(&value)?;
            if record.kind == Js8Kind::Group && !groups.contains(&record.receiver) {
                groups.push(record.receiver);
            }
        }
        groups.sort();
        Ok(groups)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            mail: self.mail.len(),
            bulletins: self.bulletins.len(),
            channels: self.channels.len(),
            js8: self.js8.len(),
        }
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    /// Store a mail record as-is, bypassing id and schema handling.
    #[cfg(test)]
    pub(crate) fn put_raw_mail(&self, record: &MailMessage) -> Result<(), StorageError> {
        self.mail
            .insert(record.unique_id.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, BbsStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = BbsStoreBuilder::new(dir.path().join("bbs.sled"))
            .open()
            .expect("store");
        (dir, store)
    }

    #[test]
    fn bulletin_insert_is_idempotent() {
        let (_dir, store) = store();
        assert!(store.upsert_bulletin("News", "ALC", "Hi", "Body", "u1").unwrap());
        assert!(!store.upsert_bulletin("News", "ALC", "Hi", "Body", "u1").unwrap());
        let posts = store.list_bulletins("news").unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].seq, 1);
    }

    #[test]
    fn mail_delete_requires_matching_recipient() {
        let (_dir, store) = store();
        store.upsert_mail(1, "ALC", 2, "s", "b", "m1").unwrap();
        assert_eq!(store.find_mail_recipient("m1").unwrap(), Some(2));
        assert!(!store.delete_mail("m1", 3).unwrap());
        assert!(store.delete_mail("m1", 2).unwrap());
        assert!(!store.delete_mail("m1", 2).unwrap());
        assert_eq!(store.find_mail_recipient("m1").unwrap(), None);
    }

    #[test]
    fn mail_listing_is_per_recipient_newest_first() {
        let (_dir, store) = store();
        store.upsert_mail(1, "A", 2, "first", "b", "m1").unwrap();
        store.upsert_mail(1, "A", 3, "other", "b", "m2").unwrap();
        store.upsert_mail(1, "A", 2, "second", "b", "m3").unwrap();
        let inbox = store.list_mail_for(2).unwrap();
        let subjects: Vec<&str> = inbox.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["second", "first"]);
        let by_seq = store.get_mail_by_seq(2, inbox[1].seq).unwrap().unwrap();
        assert_eq!(by_seq.unique_id, "m1");
        assert!(store.get_mail_by_seq(3, inbox[1].seq).unwrap().is_none());
    }

    #[test]
    fn listings_reject_unknown_schema_versions() {
        let (_dir, store) = store();
        store.upsert_mail(1, "A", 2, "s", "b", "m1").unwrap();
        let mut future = store.get_mail("m1").unwrap().unwrap();
        future.unique_id = "m2".into();
        future.schema_version = MAIL_SCHEMA_VERSION + 8;
        store.put_raw_mail(&future).unwrap();
        assert!(matches!(
            store.list_mail_for(2),
            Err(StorageError::SchemaMismatch { entity: "mail", .. })
        ));
        assert!(store.get_mail_by_seq(2, 1).is_err());
        // Other recipients' listings are unaffected
        assert!(store.list_mail_for(3).unwrap().is_empty());
    }

    #[test]
    fn mark_read_persists() {
        let (_dir, store) = store();
        store.upsert_mail(1, "A", 2, "s", "b", "m1").unwrap();
        assert!(store.mark_mail_read("m1").unwrap());
        assert!(store.get_mail("m1").unwrap().unwrap().read);
        assert!(!store.mark_mail_read("missing").unwrap());
    }

    #[test]
    fn channel_upsert_reports_changes_only() {
        let (_dir, store) = store();
        assert!(store.upsert_channel("LongFast", "https://example/1").unwrap());
        assert!(!store.upsert_channel("LongFast", "https://example/1").unwrap());
        assert!(store.upsert_channel("LongFast", "https://example/2").unwrap());
        let channels = store.list_channels().unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].url, "https://example/2");
    }

    #[test]
    fn js8_listing_filters_by_kind_and_receiver() {
        let (_dir, store) = store();
        let seeded = [
            ("@HB", Js8Kind::Group),
            ("@TTP", Js8Kind::Group),
            ("W1AW", Js8Kind::Station),
        ];
        for (recv, kind) in seeded {
            store
                .record_js8_message(&Js8Message {
                    sender: "K1ABC".into(),
                    receiver: recv.into(),
                    text: "test".into(),
                    kind,
                    received_at: Utc::now(),
                })
                .unwrap();
        }
        assert_eq!(store.js8_groups().unwrap(), vec!["@HB".to_string(), "@TTP".to_string()]);
        assert_eq!(store.list_js8(Js8Kind::Group, Some("@hb"), 10).unwrap().len(), 1);
        assert_eq!(store.list_js8(Js8Kind::Station, None, 10).unwrap().len(), 1);
        assert!(store.list_js8(Js8Kind::Urgent, None, 10).unwrap().is_empty());
    }

    #[test]
    fn counters_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bbs.sled");
        {
            let store = BbsStoreBuilder::new(&path).open().unwrap();
            store.upsert_bulletin("General", "A", "one", "b", "b1").unwrap();
            store.flush().unwrap();
        }
        let store = BbsStoreBuilder::new(&path).open().unwrap();
        store.upsert_bulletin("General", "A", "two", "b", "b2").unwrap();
        let posts = store.list_bulletins("General").unwrap();
        assert_eq!(posts[0].seq, 2);
        assert_eq!(store.stats().bulletins, 2);
    }
}

//! Per-user conversation state.
//!
//! A user with no entry sits at the main menu. Entering a sub-menu or a
//! multi-step flow stores a [`ConversationState`]; finishing, exiting with `x`
//! or idling past the configured timeout drops it again.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::collections::HashMap;

use crate::logutil::node_label;

pub const FIELD_BOARD: &str = "board";
pub const FIELD_PAGE: &str = "page";
pub const FIELD_SUBJECT: &str = "subject";
pub const FIELD_RECIPIENT: &str = "recipient";
pub const FIELD_CANDIDATES: &str = "candidates";
pub const FIELD_MAIL_ID: &str = "mail_id";
pub const FIELD_CHANNEL_NAME: &str = "channel_name";

/// Where a user is inside the menu tree or a multi-step flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    BbsMenu,
    UtilitiesMenu,
    StatsMenu,
    MailMenu,
    BoardMenu,
    BoardActions,
    ChannelMenu,
    Js8Menu,
    BulletinSubject,
    BulletinBody,
    BulletinList,
    MailRecipient,
    MailRecipientChoice,
    MailSubject,
    MailBody,
    MailList,
    MailAction,
    ChannelName,
    ChannelUrl,
    ChannelList,
    Js8GroupChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    pub step: Step,
    pub fields: HashMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            fields: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Move to `step`, keeping collected fields.
    pub fn advance(mut self, step: Step) -> Self {
        self.step = step;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn field_u32(&self, key: &str) -> Option<u32> {
        self.field(key).and_then(|v| v.parse().ok())
    }

    pub fn page(&self) -> usize {
        self.field(FIELD_PAGE)
            .and_then(|v| v.parse().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

/// Node number → state, with inactivity expiry.
#[derive(Debug)]
pub struct ConversationStore {
    states: HashMap<u32, ConversationState>,
    timeout: Duration,
}

impl ConversationStore {
    pub fn new(timeout_minutes: u32) -> Self {
        Self {
            states: HashMap::new(),
            timeout: Duration::minutes(i64::from(timeout_minutes)),
        }
    }

    fn is_expired(&self, state: &ConversationState, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(state.updated_at) > self.timeout
    }

    /// Remove and return the node's state; an expired state counts as absent.
    pub fn take(&mut self, node: u32) -> Option<ConversationState> {
        self.take_at(node, Utc::now())
    }

    pub fn take_at(&mut self, node: u32, now: DateTime<Utc>) -> Option<ConversationState> {
        let state = self.states.remove(&node)?;
        if self.is_expired(&state, now) {
            debug!("conversation state for {} expired at {:?}", node_label(node), state.step);
            return None;
        }
        Some(state)
    }

    /// Store the node's state, stamping it with the current time.
    pub fn put(&mut self, node: u32, mut state: ConversationState) {
        state.updated_at = Utc::now();
        self.states.insert(node, state);
    }

    pub fn clear(&mut self, node: u32) {
        self.states.remove(&node);
    }

    pub fn get(&self, node: u32) -> Option<&ConversationState> {
        self.states
            .get(&node)
            .filter(|s| !self.is_expired(s, Utc::now()))
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let now = Utc::now();
        let timeout = self.timeout;
        let before = self.states.len();
        self.states
            .retain(|_, s| now.signed_duration_since(s.updated_at) <= timeout);
        before - self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_removes_and_returns_live_state() {
        let mut store = ConversationStore::new(10);
        store.put(1, ConversationState::new(Step::BbsMenu).with_field(FIELD_BOARD, "News"));
        let state = store.take(1).unwrap();
        assert_eq!(state.step, Step::BbsMenu);
        assert_eq!(state.field(FIELD_BOARD), Some("News"));
        assert!(store.take(1).is_none());
    }

    #[test]
    fn expired_state_is_absent() {
        let mut store = ConversationStore::new(10);
        store.put(1, ConversationState::new(Step::MailSubject));
        let later = Utc::now() + Duration::minutes(11);
        assert!(store.take_at(1, later).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn prune_drops_only_stale_entries() {
        let mut store = ConversationStore::new(5);
        store.put(1, ConversationState::new(Step::BbsMenu));
        store.put(2, ConversationState::new(Step::BbsMenu));
        if let Some(s) = store.states.get_mut(&2) {
            s.updated_at = Utc::now() - Duration::minutes(6);
        }
        assert_eq!(store.prune_expired(), 1);
        assert!(store.get(1).is_some());
        assert!(store.get(2).is_none());
    }

    #[test]
    fn page_defaults_to_first() {
        let state = ConversationState::new(Step::MailList);
        assert_eq!(state.page(), 1);
        assert_eq!(state.with_field(FIELD_PAGE, "3").page(), 3);
    }
}

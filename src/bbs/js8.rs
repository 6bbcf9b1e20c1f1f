//! JS8Call messages relayed by the bridge.
//!
//! Each report is filed by its receiver: configured urgent groups first, then
//! configured groups, and everything else as station traffic.

use chrono::Utc;
use log::{debug, info};

use crate::config::Js8CallConfig;
use crate::logutil::{escape_log, preview};
use crate::mesh::Js8Report;
use crate::storage::{BbsStore, Js8Kind, Js8Message, StorageError};

fn listed(list: &[String], receiver: &str) -> bool {
    list.iter().any(|g| g.trim().eq_ignore_ascii_case(receiver))
}

pub fn classify(receiver: &str, config: &Js8CallConfig) -> Js8Kind {
    let receiver = receiver.trim();
    if listed(&config.urgent, receiver) {
        Js8Kind::Urgent
    } else if listed(&config.groups, receiver) {
        Js8Kind::Group
    } else {
        Js8Kind::Station
    }
}

/// Store `report` when the bridge is enabled. Returns the kind it was filed under.
pub fn record(
    report: &Js8Report,
    store: &BbsStore,
    config: &Js8CallConfig,
) -> Result<Option<Js8Kind>, StorageError> {
    if !config.enabled {
        debug!(
            "JS8Call disabled; dropping report from {}",
            escape_log(&report.sender)
        );
        return Ok(None);
    }
    let kind = classify(&report.receiver, config);
    store.record_js8_message(&Js8Message {
        sender: report.sender.trim().to_string(),
        receiver: report.receiver.trim().to_string(),
        text: report.text.clone(),
        kind,
        received_at: Utc::now(),
    })?;
    info!(
        "JS8 {:?} {} -> {}: {}",
        kind,
        escape_log(&report.sender),
        escape_log(&report.receiver),
        preview(&report.text, 80)
    );
    Ok(Some(kind))
}

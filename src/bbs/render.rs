//! Reply text builders.
//!
//! Replies travel in single mesh frames, so list views are paged and every
//! line is kept short.

use chrono::{DateTime, Utc};

use super::menu::{MenuId, MAIN_MENU};
use crate::storage::{Bulletin, Channel, Js8Message, MailMessage};

pub const LIST_FOOTER: &str = "Send a number to read, [N]ext page, E[X]IT";

pub fn main_help(bbs_name: &str) -> String {
    let body = MAIN_MENU.render();
    let entries = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    format!("💾{}💾\n{}", bbs_name, entries)
}

pub fn quick_help() -> String {
    [
        "✈️QUICK COMMANDS✈️",
        "Send command below for usage info:",
        "SM,, - Send Mail",
        "CM - Check Mail",
        "PB,, - Post Bulletin",
        "CB,, - Check Bulletins",
        "CHP,, - Post Channel",
        "CHL - List Channels",
    ]
    .join("\n")
}

pub fn board_actions(board: &str) -> String {
    let menu = MenuId::BoardActions.menu().render();
    let entries = menu.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    format!("{} Board\n{}", board, entries)
}

fn short_date(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Slice for 1-based `page`, plus whether more pages follow.
pub fn page_slice<T>(items: &[T], page: usize, page_size: usize) -> (&[T], bool) {
    let size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(size);
    if start >= items.len() {
        return (&[], false);
    }
    let end = (start + size).min(items.len());
    (&items[start..end], end < items.len())
}

pub fn bulletin_page(board: &str, bulletins: &[Bulletin], page: usize, page_size: usize) -> String {
    let (slice, more) = page_slice(bulletins, page, page_size);
    let mut out = format!("{} bulletins (page {}):", board, page);
    for b in slice {
        out.push_str(&format!("\n[{}] {} - {}", b.seq, b.subject, b.sender_short_name));
    }
    out.push('\n');
    out.push_str(if more { LIST_FOOTER } else { "Send a number to read, E[X]IT" });
    out
}

pub fn bulletin(b: &Bulletin) -> String {
    format!(
        "From: {}\nDate: {}\nSubject: {}\n\n{}",
        b.sender_short_name,
        short_date(&b.created_at),
        b.subject,
        b.body
    )
}

pub fn mail_page(mail: &[MailMessage], page: usize, page_size: usize) -> String {
    let (slice, more) = page_slice(mail, page, page_size);
    let mut out = format!("You have {} mail messages (page {}):", mail.len(), page);
    for m in slice {
        let marker = if m.read { ' ' } else { '*' };
        out.push_str(&format!(
            "\n{}[{}] {} - {}",
            marker, m.seq, m.subject, m.sender_short_name
        ));
    }
    out.push('\n');
    out.push_str(if more { LIST_FOOTER } else { "Send a number to read, E[X]IT" });
    out
}

pub fn mail(m: &MailMessage) -> String {
    format!(
        "Date: {}\nFrom: {}\nSubject: {}\n\n{}\n\n[K]eep, [D]elete or [R]eply?",
        short_date(&m.created_at),
        m.sender_short_name,
        m.subject,
        m.body
    )
}

pub fn channel_list(channels: &[Channel]) -> String {
    let mut out = String::from("Select a channel number to view:");
    for (i, c) in channels.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}", i + 1, c.name));
    }
    out
}

pub fn js8_messages(heading: &str, messages: &[Js8Message]) -> String {
    if messages.is_empty() {
        return format!("No {} found.", heading.to_lowercase());
    }
    let mut out = format!("{}:", heading);
    for m in messages {
        out.push_str(&format!(
            "\n{} {} → {}: {}",
            m.received_at.format("%m-%d %H:%M"),
            m.sender,
            m.receiver,
            m.text
        ));
    }
    out
}

//! # Conversation Engine
//!
//! Turns single mesh messages from one user into menu navigation and
//! multi-step flows. One [`ConversationState`] is kept per node; each input
//! produces replies, optional store mutations (replicated to peers as sync
//! frames) and the next state.
//!
//! ## Rules
//!
//! - Quick commands (`SM,,…`, `CM`, `PB,,…`, `CB,,…`, `CHP,,…`, `CHL`) are
//!   recognised before anything else and leave the current state alone unless
//!   they open a list.
//! - At a menu, an unknown key behaves like `x`: main help, state cleared.
//! - Inside a flow, `x` aborts to main help; an invalid value re-sends the
//!   current prompt and keeps the step.
//! - A state missing a field its step needs falls back to the enclosing menu.

use log::{debug, info};
use uuid::Uuid;

use super::menu::{MenuAction, MenuId};
use super::quick::{self, QuickCommand, QuickParse};
use super::render;
use super::state::{
    ConversationState, ConversationStore, Step, FIELD_BOARD, FIELD_CANDIDATES,
    FIELD_CHANNEL_NAME, FIELD_MAIL_ID, FIELD_PAGE, FIELD_RECIPIENT, FIELD_SUBJECT,
};
use super::sync::{peer_fanout, urgent_notification, SyncFrame};
use super::{fortune, utilities};
use crate::config::{Config, MeshIdentity};
use crate::logutil::{escape_log, node_label};
use crate::mesh::{NodeDirectory, OutgoingMessage, BROADCAST_ADDR, UNKNOWN_SHORT_NAME};
use crate::storage::types::is_urgent_board;
use crate::storage::{BbsStore, Board, Js8Kind, StorageError};
use crate::validation::{parse_node_id, sanitize_field, utf8_truncate};

const PROMPT_BULLETIN_SUBJECT: &str = "What is the subject of your bulletin? Keep it short.";
const PROMPT_BULLETIN_BODY: &str = "Send the content of your bulletin in one message.";
const PROMPT_MAIL_RECIPIENT: &str =
    "Who is the message for? Send a node id, short name or long name.";
const PROMPT_MAIL_SUBJECT: &str = "What is the subject of your message?";
const PROMPT_MAIL_BODY: &str = "Send the body of your message in one message.";
const PROMPT_MAIL_ACTION: &str = "[K]eep, [D]elete or [R]eply?";
const PROMPT_CHANNEL_NAME: &str = "Name your channel for the directory:";
const PROMPT_CHANNEL_URL: &str = "Send a URL for your channel:";
const JS8_NOT_CONFIGURED: &str = "JS8CALL is not configured on this BBS.";
const JS8_LIST_LIMIT: usize = 10;
const MAX_SHORT_NAME_BYTES: usize = 32;

/// Read-only collaborators for one input.
pub struct EngineContext<'a> {
    pub store: &'a BbsStore,
    pub directory: &'a NodeDirectory,
    pub identity: &'a MeshIdentity,
    pub config: &'a Config,
}

/// Output collected while handling one input.
struct Turn<'a> {
    ctx: &'a EngineContext<'a>,
    node: u32,
    short_name: String,
    out: Vec<OutgoingMessage>,
}

impl<'a> Turn<'a> {
    fn new(ctx: &'a EngineContext<'a>, node: u32, short_name: &str) -> Self {
        // Short names are embedded in frames; keep them delimiter-free
        let truncated = utf8_truncate(short_name, MAX_SHORT_NAME_BYTES);
        let short_name = sanitize_field(truncated, MAX_SHORT_NAME_BYTES)
            .unwrap_or_else(|_| UNKNOWN_SHORT_NAME.to_string());
        Self {
            ctx,
            node,
            short_name,
            out: Vec::new(),
        }
    }

    fn channel(&self) -> u32 {
        self.ctx.config.mesh.channel
    }

    fn max_field(&self) -> usize {
        self.ctx.config.bbs.max_field_length
    }

    fn reply(&mut self, text: impl Into<String>) {
        let channel = self.channel();
        self.out.push(OutgoingMessage::direct(self.node, channel, text));
    }

    fn notify(&mut self, node: u32, text: impl Into<String>) {
        let channel = self.channel();
        self.out.push(OutgoingMessage::direct(node, channel, text));
    }

    fn broadcast(&mut self, text: impl Into<String>) {
        let channel = self.channel();
        self.out.push(OutgoingMessage::broadcast(channel, text));
    }

    fn replicate(&mut self, frame: &SyncFrame) {
        let channel = self.channel();
        self.out
            .extend(peer_fanout(frame, self.ctx.identity.peers.iter(), channel));
    }

    fn main_help(&mut self) {
        let text = render::main_help(&self.ctx.config.bbs.name);
        self.reply(text);
    }
}

pub struct ConversationEngine {
    states: ConversationStore,
}

impl ConversationEngine {
    pub fn new(timeout_minutes: u32) -> Self {
        Self {
            states: ConversationStore::new(timeout_minutes),
        }
    }

    /// Current (unexpired) state for `node`, if any.
    pub fn state(&self, node: u32) -> Option<&ConversationState> {
        self.states.get(node)
    }

    pub fn prune_expired(&mut self) -> usize {
        self.states.prune_expired()
    }

    pub fn active_conversations(&self) -> usize {
        self.states.len()
    }

    /// Handle one command message from `node`. Returns every message to transmit.
    pub fn handle(
        &mut self,
        ctx: &EngineContext<'_>,
        node: u32,
        short_name: &str,
        input: &str,
    ) -> Result<Vec<OutgoingMessage>, StorageError> {
        let mut turn = Turn::new(ctx, node, short_name);
        let current = self.states.take(node);
        let previous = current.clone();
        debug!(
            "conversation {} step={:?} input='{}'",
            node_label(node),
            current.as_ref().map(|s| s.step),
            escape_log(input)
        );

        match advance(&mut turn, current, input) {
            Ok(Some(state)) => self.states.put(node, state),
            Ok(None) => self.states.clear(node),
            Err(e) => {
                // The failed input is dropped; the user stays where they were
                if let Some(state) = previous {
                    self.states.put(node, state);
                }
                return Err(e);
            }
        }
        Ok(turn.out)
    }
}

fn advance(turn: &mut Turn<'_>, current: Option<ConversationState>, input: &str) -> Next {
    match quick::parse(input) {
        QuickParse::Command(cmd) => run_quick(turn, cmd, current),
        QuickParse::Usage(usage) => {
            turn.reply(usage);
            Ok(current)
        }
        QuickParse::NotQuick => match current {
            None => menu_input(turn, MenuId::Main, None, input),
            Some(state) if state.step.is_menu() => {
                let menu = state.step.menu();
                menu_input(turn, menu, Some(state), input)
            }
            Some(state) => flow_input(turn, state, input),
        },
    }
}

type Next = Result<Option<ConversationState>, StorageError>;

fn open_menu(turn: &mut Turn<'_>, id: MenuId) -> Option<ConversationState> {
    if id == MenuId::Main {
        turn.main_help();
        return None;
    }
    turn.reply(id.menu().render());
    id.step().map(ConversationState::new)
}

fn board_menu(turn: &mut Turn<'_>, board: &str) -> Option<ConversationState> {
    turn.reply(render::board_actions(board));
    Some(ConversationState::new(Step::BoardActions).with_field(FIELD_BOARD, board))
}

/// Recover from a state that lacks what its step needs.
fn enclosing(
    turn: &mut Turn<'_>,
    state: &ConversationState,
    missing: &str,
) -> Option<ConversationState> {
    debug!(
        "conversation {} at {:?} missing {}; returning to menu",
        node_label(turn.node),
        state.step,
        missing
    );
    match (state.step.menu(), state.field(FIELD_BOARD)) {
        (MenuId::BoardActions, Some(board)) => {
            let board = board.to_string();
            board_menu(turn, &board)
        }
        (MenuId::BoardActions, None) => open_menu(turn, MenuId::Boards),
        (id, _) => open_menu(turn, id),
    }
}

fn menu_input(
    turn: &mut Turn<'_>,
    menu: MenuId,
    state: Option<ConversationState>,
    input: &str,
) -> Next {
    match menu.menu().lookup(input) {
        None | Some(MenuAction::Help) => {
            turn.main_help();
            Ok(None)
        }
        Some(action) => perform(turn, action, state),
    }
}

fn stay(step: Step) -> Option<ConversationState> {
    Some(ConversationState::new(step))
}

fn perform(turn: &mut Turn<'_>, action: MenuAction, state: Option<ConversationState>) -> Next {
    let ctx = turn.ctx;
    match action {
        MenuAction::Help => {
            turn.main_help();
            Ok(None)
        }
        MenuAction::QuickHelp => {
            turn.reply(render::quick_help());
            Ok(None)
        }
        MenuAction::Open(id) => Ok(open_menu(turn, id)),
        MenuAction::SelectBoard(board) => Ok(board_menu(turn, board.name())),
        MenuAction::ReadBoard | MenuAction::PostBulletin => {
            let state = state.unwrap_or_else(|| ConversationState::new(Step::BoardActions));
            let Some(board) = state.field(FIELD_BOARD).map(str::to_string) else {
                return Ok(enclosing(turn, &state, FIELD_BOARD));
            };
            if action == MenuAction::PostBulletin {
                turn.reply(PROMPT_BULLETIN_SUBJECT);
                return Ok(Some(state.advance(Step::BulletinSubject)));
            }
            list_board(turn, &board)
        }
        MenuAction::ReadMail => list_mail(turn),
        MenuAction::SendMail => {
            turn.reply(PROMPT_MAIL_RECIPIENT);
            Ok(stay(Step::MailRecipient))
        }
        MenuAction::ViewChannels => {
            let channels = ctx.store.list_channels()?;
            if channels.is_empty() {
                turn.reply(format!(
                    "No channels in the directory yet.\n\n{}",
                    MenuId::Channels.menu().render()
                ));
                return Ok(stay(Step::ChannelMenu));
            }
            turn.reply(render::channel_list(&channels));
            Ok(stay(Step::ChannelList))
        }
        MenuAction::PostChannel => {
            turn.reply(PROMPT_CHANNEL_NAME);
            Ok(stay(Step::ChannelName))
        }
        MenuAction::StatsTotal => {
            turn.reply(utilities::total_nodes(ctx.directory));
            Ok(stay(Step::StatsMenu))
        }
        MenuAction::StatsHardware => {
            turn.reply(utilities::hardware_models(ctx.directory));
            Ok(stay(Step::StatsMenu))
        }
        MenuAction::StatsRoles => {
            turn.reply(utilities::roles(ctx.directory));
            Ok(stay(Step::StatsMenu))
        }
        MenuAction::Fortune => {
            turn.reply(fortune::get_fortune());
            Ok(stay(Step::UtilitiesMenu))
        }
        MenuAction::WallOfShame => {
            turn.reply(utilities::wall_of_shame(ctx.directory));
            Ok(stay(Step::UtilitiesMenu))
        }
        MenuAction::Js8Groups => {
            if !ctx.config.js8call.enabled {
                turn.reply(JS8_NOT_CONFIGURED);
                return Ok(stay(Step::Js8Menu));
            }
            let groups = js8_groups(ctx)?;
            if groups.is_empty() {
                turn.reply("No group messages found.");
                return Ok(stay(Step::Js8Menu));
            }
            turn.reply(render_choices("Select a group:", &groups));
            Ok(Some(
                ConversationState::new(Step::Js8GroupChoice)
                    .with_field(FIELD_CANDIDATES, groups.join(",")),
            ))
        }
        MenuAction::Js8Stations | MenuAction::Js8Urgent => {
            if !ctx.config.js8call.enabled {
                turn.reply(JS8_NOT_CONFIGURED);
                return Ok(stay(Step::Js8Menu));
            }
            let (kind, heading) = if action == MenuAction::Js8Urgent {
                (Js8Kind::Urgent, "Urgent Messages")
            } else {
                (Js8Kind::Station, "Station Messages")
            };
            let messages = ctx.store.list_js8(kind, None, JS8_LIST_LIMIT)?;
            turn.reply(render::js8_messages(heading, &messages));
            Ok(stay(Step::Js8Menu))
        }
    }
}

fn js8_groups(ctx: &EngineContext<'_>) -> Result<Vec<String>, StorageError> {
    let mut groups: Vec<String> = ctx.config.js8call.groups.clone();
    for g in ctx.store.js8_groups()? {
        if !groups.iter().any(|known| known.eq_ignore_ascii_case(&g)) {
            groups.push(g);
        }
    }
    Ok(groups)
}

fn render_choices(heading: &str, items: &[String]) -> String {
    let mut out = heading.to_string();
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!("\n[{}] {}", i + 1, item));
    }
    out
}

/// 1-based selection into a list of `len` items.
fn choice(input: &str, len: usize) -> Option<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= len => Some(n - 1),
        _ => None,
    }
}

fn list_board(turn: &mut Turn<'_>, board: &str) -> Next {
    let bulletins = turn.ctx.store.list_bulletins(board)?;
    if bulletins.is_empty() {
        turn.reply(format!("No bulletins in {}.", board));
        return Ok(board_menu(turn, board));
    }
    let page_size = turn.ctx.config.bbs.page_size;
    turn.reply(render::bulletin_page(board, &bulletins, 1, page_size));
    Ok(Some(
        ConversationState::new(Step::BulletinList)
            .with_field(FIELD_BOARD, board)
            .with_field(FIELD_PAGE, "1"),
    ))
}

fn list_mail(turn: &mut Turn<'_>) -> Next {
    let mail = turn.ctx.store.list_mail_for(turn.node)?;
    if mail.is_empty() {
        turn.reply(format!(
            "You have no mail.\n\n{}",
            MenuId::Mail.menu().render()
        ));
        return Ok(stay(Step::MailMenu));
    }
    let page_size = turn.ctx.config.bbs.page_size;
    turn.reply(render::mail_page(&mail, 1, page_size));
    Ok(Some(
        ConversationState::new(Step::MailList).with_field(FIELD_PAGE, "1"),
    ))
}

/// Resolve user-typed recipient text to candidate node numbers.
fn resolve_recipients(directory: &NodeDirectory, input: &str) -> Vec<u32> {
    let matches: Vec<u32> = directory
        .find_matches(input)
        .into_iter()
        .map(|n| n.node_id)
        .collect();
    if !matches.is_empty() {
        return matches;
    }
    match parse_node_id(input) {
        Ok(id) if id != 0 && id != BROADCAST_ADDR => vec![id],
        _ => Vec::new(),
    }
}

fn recipient_label(directory: &NodeDirectory, node: u32) -> String {
    match directory.get(node) {
        Some(entry) if !entry.long_name.is_empty() => format!(
            "{} ({}) {}",
            directory.short_name_for(node),
            node_label(node),
            entry.long_name
        ),
        _ => format!("{} ({})", directory.short_name_for(node), node_label(node)),
    }
}

fn flow_input(turn: &mut Turn<'_>, state: ConversationState, input: &str) -> Next {
    if input.trim().eq_ignore_ascii_case("x") {
        turn.main_help();
        return Ok(None);
    }
    let ctx = turn.ctx;
    let max = turn.max_field();
    match state.step {
        Step::BulletinSubject => {
            if state.field(FIELD_BOARD).is_none() {
                return Ok(enclosing(turn, &state, FIELD_BOARD));
            }
            match sanitize_field(input, max) {
                Ok(subject) => {
                    turn.reply(PROMPT_BULLETIN_BODY);
                    Ok(Some(
                        state.with_field(FIELD_SUBJECT, subject).advance(Step::BulletinBody),
                    ))
                }
                Err(e) => {
                    turn.reply(format!("Invalid subject ({}).\n{}", e, PROMPT_BULLETIN_SUBJECT));
                    Ok(Some(state))
                }
            }
        }
        Step::BulletinBody => {
            let (Some(board), Some(subject)) = (
                state.field(FIELD_BOARD).map(str::to_string),
                state.field(FIELD_SUBJECT).map(str::to_string),
            ) else {
                return Ok(enclosing(turn, &state, FIELD_SUBJECT));
            };
            match sanitize_field(input, max) {
                Ok(body) => {
                    post_bulletin(turn, &board, &subject, &body)?;
                    turn.reply(format!("Your bulletin has been posted to {}.", board));
                    Ok(None)
                }
                Err(e) => {
                    turn.reply(format!("Invalid content ({}).\n{}", e, PROMPT_BULLETIN_BODY));
                    Ok(Some(state))
                }
            }
        }
        Step::BulletinList => {
            let Some(board) = state.field(FIELD_BOARD).map(str::to_string) else {
                return Ok(enclosing(turn, &state, FIELD_BOARD));
            };
            let bulletins = ctx.store.list_bulletins(&board)?;
            let page_size = ctx.config.bbs.page_size;
            let page = state.page();
            let trimmed = input.trim();
            if trimmed.eq_ignore_ascii_case("n") {
                let next_page = if page * page_size < bulletins.len() { page + 1 } else { page };
                turn.reply(render::bulletin_page(&board, &bulletins, next_page, page_size));
                return Ok(Some(state.with_field(FIELD_PAGE, next_page.to_string())));
            }
            let selected = match trimmed.parse::<u64>() {
                Ok(seq) => ctx.store.get_bulletin_by_seq(&board, seq)?,
                Err(_) => None,
            };
            match selected {
                Some(b) => {
                    let text = render::bulletin(&b);
                    turn.reply(text);
                    Ok(board_menu(turn, &board))
                }
                None => {
                    turn.reply(render::bulletin_page(&board, &bulletins, page, page_size));
                    Ok(Some(state))
                }
            }
        }
        Step::MailRecipient => {
            let candidates = resolve_recipients(ctx.directory, input);
            match candidates.len() {
                0 => {
                    turn.reply(format!(
                        "No node found matching '{}'.\n{}",
                        input.trim(),
                        PROMPT_MAIL_RECIPIENT
                    ));
                    Ok(Some(state))
                }
                1 => {
                    let recipient = candidates[0];
                    turn.reply(format!(
                        "Sending to {}.\n{}",
                        ctx.directory.short_name_for(recipient),
                        PROMPT_MAIL_SUBJECT
                    ));
                    Ok(Some(
                        state
                            .with_field(FIELD_RECIPIENT, recipient.to_string())
                            .advance(Step::MailSubject),
                    ))
                }
                _ => {
                    let labels: Vec<String> = candidates
                        .iter()
                        .map(|id| recipient_label(ctx.directory, *id))
                        .collect();
                    turn.reply(render_choices("Multiple nodes match. Send a number:", &labels));
                    let joined: Vec<String> = candidates.iter().map(u32::to_string).collect();
                    Ok(Some(
                        state
                            .with_field(FIELD_CANDIDATES, joined.join(","))
                            .advance(Step::MailRecipientChoice),
                    ))
                }
            }
        }
        Step::MailRecipientChoice => {
            let candidates: Vec<u32> = state
                .field(FIELD_CANDIDATES)
                .unwrap_or("")
                .split(',')
                .filter_map(|c| c.parse().ok())
                .collect();
            if candidates.is_empty() {
                return Ok(enclosing(turn, &state, FIELD_CANDIDATES));
            }
            match choice(input, candidates.len()) {
                Some(i) => {
                    let recipient = candidates[i];
                    turn.reply(format!(
                        "Sending to {}.\n{}",
                        ctx.directory.short_name_for(recipient),
                        PROMPT_MAIL_SUBJECT
                    ));
                    Ok(Some(
                        state
                            .with_field(FIELD_RECIPIENT, recipient.to_string())
                            .advance(Step::MailSubject),
                    ))
                }
                None => {
                    let labels: Vec<String> = candidates
                        .iter()
                        .map(|id| recipient_label(ctx.directory, *id))
                        .collect();
                    turn.reply(render_choices("Multiple nodes match. Send a number:", &labels));
                    Ok(Some(state))
                }
            }
        }
        Step::MailSubject => {
            if state.field_u32(FIELD_RECIPIENT).is_none() {
                return Ok(enclosing(turn, &state, FIELD_RECIPIENT));
            }
            match sanitize_field(input, max) {
                Ok(subject) => {
                    turn.reply(PROMPT_MAIL_BODY);
                    Ok(Some(
                        state.with_field(FIELD_SUBJECT, subject).advance(Step::MailBody),
                    ))
                }
                Err(e) => {
                    turn.reply(format!("Invalid subject ({}).\n{}", e, PROMPT_MAIL_SUBJECT));
                    Ok(Some(state))
                }
            }
        }
        Step::MailBody => {
            let (Some(recipient), Some(subject)) = (
                state.field_u32(FIELD_RECIPIENT),
                state.field(FIELD_SUBJECT).map(str::to_string),
            ) else {
                return Ok(enclosing(turn, &state, FIELD_SUBJECT));
            };
            match sanitize_field(input, max) {
                Ok(body) => {
                    send_mail(turn, recipient, &subject, &body)?;
                    Ok(None)
                }
                Err(e) => {
                    turn.reply(format!("Invalid message ({}).\n{}", e, PROMPT_MAIL_BODY));
                    Ok(Some(state))
                }
            }
        }
        Step::MailList => {
            let mail = ctx.store.list_mail_for(turn.node)?;
            if mail.is_empty() {
                return Ok(enclosing(turn, &state, "mail"));
            }
            let page_size = ctx.config.bbs.page_size;
            let page = state.page();
            let trimmed = input.trim();
            if trimmed.eq_ignore_ascii_case("n") {
                let next_page = if page * page_size < mail.len() { page + 1 } else { page };
                turn.reply(render::mail_page(&mail, next_page, page_size));
                return Ok(Some(state.with_field(FIELD_PAGE, next_page.to_string())));
            }
            let selected = match trimmed.parse::<u64>() {
                Ok(seq) => ctx.store.get_mail_by_seq(turn.node, seq)?,
                Err(_) => None,
            };
            match selected {
                Some(m) => {
                    ctx.store.mark_mail_read(&m.unique_id)?;
                    turn.reply(render::mail(&m));
                    Ok(Some(
                        ConversationState::new(Step::MailAction)
                            .with_field(FIELD_MAIL_ID, m.unique_id.clone()),
                    ))
                }
                None => {
                    turn.reply(render::mail_page(&mail, page, page_size));
                    Ok(Some(state))
                }
            }
        }
        Step::MailAction => {
            let mail = match state.field(FIELD_MAIL_ID) {
                Some(uid) => ctx.store.get_mail(uid)?,
                None => None,
            };
            let Some(mail) = mail.filter(|m| m.recipient_id == turn.node) else {
                turn.reply("That message is no longer available.");
                return Ok(enclosing(turn, &state, FIELD_MAIL_ID));
            };
            match input.trim().to_ascii_lowercase().as_str() {
                "k" => {
                    turn.reply("Message kept in your mailbox.");
                    Ok(None)
                }
                "d" => {
                    let removed = ctx.store.delete_mail(&mail.unique_id, turn.node)?;
                    if removed {
                        turn.replicate(&SyncFrame::DeleteMail {
                            unique_id: mail.unique_id.clone(),
                        });
                    }
                    info!(
                        "Mail {} deleted by {} removed={}",
                        mail.unique_id,
                        node_label(turn.node),
                        removed
                    );
                    turn.reply("Message deleted.");
                    Ok(None)
                }
                "r" => {
                    turn.reply(format!(
                        "Replying to {}.\n{}",
                        mail.sender_short_name, PROMPT_MAIL_SUBJECT
                    ));
                    Ok(Some(
                        ConversationState::new(Step::MailSubject)
                            .with_field(FIELD_RECIPIENT, mail.sender_id.to_string()),
                    ))
                }
                _ => {
                    turn.reply(PROMPT_MAIL_ACTION);
                    Ok(Some(state))
                }
            }
        }
        Step::ChannelName => match sanitize_field(input, max) {
            Ok(name) => {
                turn.reply(PROMPT_CHANNEL_URL);
                Ok(Some(
                    state.with_field(FIELD_CHANNEL_NAME, name).advance(Step::ChannelUrl),
                ))
            }
            Err(e) => {
                turn.reply(format!("Invalid name ({}).\n{}", e, PROMPT_CHANNEL_NAME));
                Ok(Some(state))
            }
        },
        Step::ChannelUrl => {
            let Some(name) = state.field(FIELD_CHANNEL_NAME).map(str::to_string) else {
                return Ok(enclosing(turn, &state, FIELD_CHANNEL_NAME));
            };
            match sanitize_field(input, max) {
                Ok(url) => {
                    post_channel(turn, &name, &url)?;
                    turn.reply("Your channel has been added to the directory.");
                    Ok(None)
                }
                Err(e) => {
                    turn.reply(format!("Invalid URL ({}).\n{}", e, PROMPT_CHANNEL_URL));
                    Ok(Some(state))
                }
            }
        }
        Step::ChannelList => {
            let channels = ctx.store.list_channels()?;
            if channels.is_empty() {
                return Ok(enclosing(turn, &state, "channels"));
            }
            match choice(input, channels.len()) {
                Some(i) => {
                    let c = &channels[i];
                    turn.reply(format!(
                        "{}: {}\n\n{}",
                        c.name,
                        c.url,
                        MenuId::Channels.menu().render()
                    ));
                    Ok(stay(Step::ChannelMenu))
                }
                None => {
                    turn.reply(render::channel_list(&channels));
                    Ok(Some(state))
                }
            }
        }
        Step::Js8GroupChoice => {
            let groups: Vec<String> = state
                .field(FIELD_CANDIDATES)
                .unwrap_or("")
                .split(',')
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
            if groups.is_empty() {
                return Ok(enclosing(turn, &state, FIELD_CANDIDATES));
            }
            match choice(input, groups.len()) {
                Some(i) => {
                    let group = &groups[i];
                    let messages = ctx.store.list_js8(Js8Kind::Group, Some(group), JS8_LIST_LIMIT)?;
                    turn.reply(render::js8_messages(&format!("Messages for {}", group), &messages));
                    Ok(stay(Step::Js8Menu))
                }
                None => {
                    turn.reply(render_choices("Select a group:", &groups));
                    Ok(Some(state))
                }
            }
        }
        Step::BbsMenu
        | Step::UtilitiesMenu
        | Step::StatsMenu
        | Step::MailMenu
        | Step::BoardMenu
        | Step::BoardActions
        | Step::ChannelMenu
        | Step::Js8Menu => {
            let menu = state.step.menu();
            menu_input(turn, menu, Some(state), input)
        }
    }
}

/// Store a new bulletin, replicate it and announce it when urgent.
fn post_bulletin(
    turn: &mut Turn<'_>,
    board: &str,
    subject: &str,
    body: &str,
) -> Result<(), StorageError> {
    let unique_id = Uuid::new_v4().to_string();
    let created = turn
        .ctx
        .store
        .upsert_bulletin(board, &turn.short_name, subject, body, &unique_id)?;
    info!(
        "Bulletin {} posted to {} by {} ({})",
        unique_id,
        board,
        escape_log(&turn.short_name),
        node_label(turn.node)
    );
    let frame = SyncFrame::Bulletin {
        board: board.to_string(),
        sender_short_name: turn.short_name.clone(),
        subject: subject.to_string(),
        body: body.to_string(),
        unique_id,
    };
    turn.replicate(&frame);
    if created && is_urgent_board(board) {
        let text = urgent_notification(&turn.short_name, subject);
        turn.broadcast(text);
    }
    Ok(())
}

/// Store a new mail, replicate it, notify the recipient and confirm to the sender.
fn send_mail(
    turn: &mut Turn<'_>,
    recipient: u32,
    subject: &str,
    body: &str,
) -> Result<(), StorageError> {
    let unique_id = Uuid::new_v4().to_string();
    turn.ctx.store.upsert_mail(
        turn.node,
        &turn.short_name,
        recipient,
        subject,
        body,
        &unique_id,
    )?;
    info!(
        "Mail {} from {} to {}",
        unique_id,
        node_label(turn.node),
        node_label(recipient)
    );
    let frame = SyncFrame::Mail {
        sender_id: turn.node,
        sender_short_name: turn.short_name.clone(),
        recipient_id: recipient,
        subject: subject.to_string(),
        body: body.to_string(),
        unique_id,
    };
    turn.replicate(&frame);
    if recipient != turn.node {
        let text = format!(
            "You have a new mail message from {}. \
             Check your mailbox by responding to this message with CM.",
            turn.short_name
        );
        turn.notify(recipient, text);
    }
    let recipient_name = turn.ctx.directory.short_name_for(recipient);
    turn.reply(format!("Mail has been posted to the mailbox of {}.", recipient_name));
    Ok(())
}

fn post_channel(turn: &mut Turn<'_>, name: &str, url: &str) -> Result<(), StorageError> {
    let changed = turn.ctx.store.upsert_channel(name, url)?;
    debug!("channel {} posted by {} changed={}", name, node_label(turn.node), changed);
    turn.replicate(&SyncFrame::Channel {
        name: name.to_string(),
        url: url.to_string(),
    });
    Ok(())
}

fn run_quick(turn: &mut Turn<'_>, cmd: QuickCommand, current: Option<ConversationState>) -> Next {
    let ctx = turn.ctx;
    let max = turn.max_field();
    match cmd {
        QuickCommand::SendMail {
            recipient,
            subject,
            body,
        } => {
            let candidates = resolve_recipients(ctx.directory, &recipient);
            match candidates.as_slice() {
                [] => turn.reply(format!("Node '{}' not found.", recipient)),
                [node] => match (sanitize_field(&subject, max), sanitize_field(&body, max)) {
                    (Ok(subject), Ok(body)) => send_mail(turn, *node, &subject, &body)?,
                    _ => turn.reply(quick::SM_USAGE),
                },
                _ => turn.reply(format!(
                    "Multiple nodes match '{}'. Use the node id (!xxxxxxxx) instead.",
                    recipient
                )),
            }
            Ok(current)
        }
        QuickCommand::CheckMail => list_mail(turn),
        QuickCommand::PostBulletin {
            board,
            subject,
            body,
        } => {
            let board = match Board::from_name(&board) {
                Some(known) => Ok(known.name().to_string()),
                None => sanitize_field(&board, max),
            };
            match (board, sanitize_field(&subject, max), sanitize_field(&body, max)) {
                (Ok(board), Ok(subject), Ok(body)) => {
                    post_bulletin(turn, &board, &subject, &body)?;
                    turn.reply(format!("Your bulletin has been posted to {}.", board));
                }
                _ => turn.reply(quick::PB_USAGE),
            }
            Ok(current)
        }
        QuickCommand::CheckBulletins { board } => {
            let board = Board::from_name(&board)
                .map(|b| b.name().to_string())
                .unwrap_or(board);
            let bulletins = ctx.store.list_bulletins(&board)?;
            if bulletins.is_empty() {
                turn.reply(format!("No bulletins in {}.", board));
                return Ok(current);
            }
            turn.reply(render::bulletin_page(&board, &bulletins, 1, ctx.config.bbs.page_size));
            Ok(Some(
                ConversationState::new(Step::BulletinList)
                    .with_field(FIELD_BOARD, board)
                    .with_field(FIELD_PAGE, "1"),
            ))
        }
        QuickCommand::PostChannel { name, url } => {
            match (sanitize_field(&name, max), sanitize_field(&url, max)) {
                (Ok(name), Ok(url)) => {
                    post_channel(turn, &name, &url)?;
                    turn.reply("Your channel has been added to the directory.");
                }
                _ => turn.reply(quick::CHP_USAGE),
            }
            Ok(current)
        }
        QuickCommand::ListChannels => {
            let channels = ctx.store.list_channels()?;
            if channels.is_empty() {
                turn.reply("No channels in the directory yet.");
            } else {
                let lines: Vec<String> = channels
                    .iter()
                    .map(|c| format!("{}: {}", c.name, c.url))
                    .collect();
                turn.reply(lines.join("\n"));
            }
            Ok(current)
        }
    }
}

//! Static menu tables.
//!
//! Every menu maps a single-letter key to a [`MenuAction`]. The tables are
//! plain data; [`super::conversation`] interprets the actions.

use crate::storage::Board;

use super::state::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuId {
    Main,
    Bbs,
    Utilities,
    Stats,
    Mail,
    Boards,
    BoardActions,
    Channels,
    Js8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    /// Main help text; clears state.
    Help,
    QuickHelp,
    Open(MenuId),
    SelectBoard(Board),
    ReadBoard,
    PostBulletin,
    ReadMail,
    SendMail,
    ViewChannels,
    PostChannel,
    StatsTotal,
    StatsHardware,
    StatsRoles,
    Fortune,
    WallOfShame,
    Js8Groups,
    Js8Stations,
    Js8Urgent,
}

#[derive(Debug)]
pub struct MenuEntry {
    pub key: char,
    pub label: &'static str,
    pub action: MenuAction,
}

#[derive(Debug)]
pub struct Menu {
    pub id: MenuId,
    pub title: &'static str,
    pub entries: &'static [MenuEntry],
}

const fn entry(key: char, label: &'static str, action: MenuAction) -> MenuEntry {
    MenuEntry { key, label, action }
}

const EXIT: MenuEntry = entry('x', "E[X]IT", MenuAction::Help);

pub static MAIN_MENU: Menu = Menu {
    id: MenuId::Main,
    title: "Main Menu",
    entries: &[
        entry('q', "[Q]uick Commands", MenuAction::QuickHelp),
        entry('b', "[B]BS", MenuAction::Open(MenuId::Bbs)),
        entry('u', "[U]tilities", MenuAction::Open(MenuId::Utilities)),
        EXIT,
    ],
};

pub static BBS_MENU: Menu = Menu {
    id: MenuId::Bbs,
    title: "📰BBS Menu📰",
    entries: &[
        entry('m', "[M]ail", MenuAction::Open(MenuId::Mail)),
        entry('b', "[B]ulletins", MenuAction::Open(MenuId::Boards)),
        entry('c', "[C]hannel Dir", MenuAction::Open(MenuId::Channels)),
        entry('j', "[J]S8CALL", MenuAction::Open(MenuId::Js8)),
        EXIT,
    ],
};

pub static UTILITIES_MENU: Menu = Menu {
    id: MenuId::Utilities,
    title: "🛠️Utilities Menu🛠️",
    entries: &[
        entry('s', "[S]tats", MenuAction::Open(MenuId::Stats)),
        entry('f', "[F]ortune", MenuAction::Fortune),
        entry('w', "[W]all of Shame", MenuAction::WallOfShame),
        EXIT,
    ],
};

pub static STATS_MENU: Menu = Menu {
    id: MenuId::Stats,
    title: "📊Stats Menu📊",
    entries: &[
        entry('t', "[T]otal Nodes", MenuAction::StatsTotal),
        entry('h', "[H]W Models", MenuAction::StatsHardware),
        entry('r', "[R]oles", MenuAction::StatsRoles),
        EXIT,
    ],
};

pub static MAIL_MENU: Menu = Menu {
    id: MenuId::Mail,
    title: "✉️Mail Menu✉️",
    entries: &[
        entry('r', "[R]ead", MenuAction::ReadMail),
        entry('s', "[S]end", MenuAction::SendMail),
        EXIT,
    ],
};

pub static BOARDS_MENU: Menu = Menu {
    id: MenuId::Boards,
    title: "📰Bulletin Menu📰",
    entries: &[
        entry('g', "[G]eneral", MenuAction::SelectBoard(Board::General)),
        entry('i', "[I]nfo", MenuAction::SelectBoard(Board::Info)),
        entry('n', "[N]ews", MenuAction::SelectBoard(Board::News)),
        entry('u', "[U]rgent", MenuAction::SelectBoard(Board::Urgent)),
        EXIT,
    ],
};

pub static BOARD_ACTIONS_MENU: Menu = Menu {
    id: MenuId::BoardActions,
    title: "Board",
    entries: &[
        entry('r', "[R]ead", MenuAction::ReadBoard),
        entry('p', "[P]ost", MenuAction::PostBulletin),
        EXIT,
    ],
};

pub static CHANNELS_MENU: Menu = Menu {
    id: MenuId::Channels,
    title: "📚Channel Directory📚",
    entries: &[
        entry('v', "[V]iew", MenuAction::ViewChannels),
        entry('p', "[P]ost", MenuAction::PostChannel),
        EXIT,
    ],
};

pub static JS8_MENU: Menu = Menu {
    id: MenuId::Js8,
    title: "📻JS8CALL Menu📻",
    entries: &[
        entry('g', "[G]roup Messages", MenuAction::Js8Groups),
        entry('s', "[S]tation Messages", MenuAction::Js8Stations),
        entry('u', "[U]rgent Messages", MenuAction::Js8Urgent),
        EXIT,
    ],
};

impl MenuId {
    pub fn menu(self) -> &'static Menu {
        match self {
            MenuId::Main => &MAIN_MENU,
            MenuId::Bbs => &BBS_MENU,
            MenuId::Utilities => &UTILITIES_MENU,
            MenuId::Stats => &STATS_MENU,
            MenuId::Mail => &MAIL_MENU,
            MenuId::Boards => &BOARDS_MENU,
            MenuId::BoardActions => &BOARD_ACTIONS_MENU,
            MenuId::Channels => &CHANNELS_MENU,
            MenuId::Js8 => &JS8_MENU,
        }
    }

    /// State step that keeps a user inside this menu. The main menu has none.
    pub fn step(self) -> Option<Step> {
        match self {
            MenuId::Main => None,
            MenuId::Bbs => Some(Step::BbsMenu),
            MenuId::Utilities => Some(Step::UtilitiesMenu),
            MenuId::Stats => Some(Step::StatsMenu),
            MenuId::Mail => Some(Step::MailMenu),
            MenuId::Boards => Some(Step::BoardMenu),
            MenuId::BoardActions => Some(Step::BoardActions),
            MenuId::Channels => Some(Step::ChannelMenu),
            MenuId::Js8 => Some(Step::Js8Menu),
        }
    }
}

impl Step {
    /// The menu a step belongs to: itself for menu steps, the enclosing
    /// menu for flow steps.
    pub fn menu(self) -> MenuId {
        match self {
            Step::BbsMenu => MenuId::Bbs,
            Step::UtilitiesMenu => MenuId::Utilities,
            Step::StatsMenu => MenuId::Stats,
            Step::MailMenu
            | Step::MailRecipient
            | Step::MailRecipientChoice
            | Step::MailSubject
            | Step::MailBody
            | Step::MailList
            | Step::MailAction => MenuId::Mail,
            Step::BoardMenu => MenuId::Boards,
            Step::BoardActions
            | Step::BulletinSubject
            | Step::BulletinBody
            | Step::BulletinList => MenuId::BoardActions,
            Step::ChannelMenu | Step::ChannelName | Step::ChannelUrl | Step::ChannelList => {
                MenuId::Channels
            }
            Step::Js8Menu | Step::Js8GroupChoice => MenuId::Js8,
        }
    }

    pub fn is_menu(self) -> bool {
        self.menu().step() == Some(self)
    }
}

impl Menu {
    /// Look up a key. Input is trimmed, case-insensitive and must be a
    /// single character.
    pub fn lookup(&self, input: &str) -> Option<MenuAction> {
        let mut chars = input.trim().chars();
        let key = chars.next()?.to_ascii_lowercase();
        if chars.next().is_some() {
            return None;
        }
        self.entries.iter().find(|e| e.key == key).map(|e| e.action)
    }

    pub fn render(&self) -> String {
        let mut out = String::from(self.title);
        for entry in self.entries {
            out.push('\n');
            out.push_str(entry.label);
        }
        out
    }
}

//! Quick commands: single-message shortcuts that work from any menu.
//!
//! Argument lists follow a `,,` separator after the command word:
//!
//! ```text
//! SM,,recipient,subject,body    send mail
//! CM                            check mail
//! PB,,board,subject,body        post bulletin
//! CB,,board                     check bulletins
//! CHP,,name,url                 post channel
//! CHL                           list channels
//! ```
//!
//! The last field keeps any further commas. A recognised command word with a
//! missing or short argument list yields [`QuickParse::Usage`].
use log::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickCommand {
    SendMail {
        recipient: String,
        subject: String,
        body: String,
    },
    CheckMail,
    PostBulletin {
        board: String,
        subject: String,
        body: String,
    },
    CheckBulletins {
        board: String,
    },
    PostChannel {
        name: String,
        url: String,
    },
    ListChannels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickParse {
    NotQuick,
    Command(QuickCommand),
    Usage(&'static str),
}

pub const SM_USAGE: &str = "Send Mail Quick Command format:\nSM,,{short_name},{subject},{message}";
pub const PB_USAGE: &str =
    "Post Bulletin Quick Command format:\nPB,,{board_name},{subject},{content}";
pub const CB_USAGE: &str = "Check Bulletins Quick Command format:\nCB,,{board_name}";
pub const CHP_USAGE: &str = "Post Channel Quick Command format:\nCHP,,{channel_name},{channel_url}";

/// Split `rest` into exactly `n` comma-separated fields, the last taking the remainder.
fn fields(rest: &str, n: usize) -> Option<Vec<String>> {
    let parts: Vec<String> = rest.splitn(n, ',').map(|p| p.trim().to_string()).collect();
    if parts.len() != n || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(parts)
}

pub fn parse(raw: &str) -> QuickParse {
    let trimmed = raw.trim();
    let (word, rest) = match trimmed.split_once(",,") {
        Some((w, r)) => (w.trim(), Some(r)),
        None => (trimmed, None),
    };
    let upper = word.to_ascii_uppercase();
    let parsed = match (upper.as_str(), rest) {
        ("CM", None) => QuickParse::Command(QuickCommand::CheckMail),
        ("CHL", None) => QuickParse::Command(QuickCommand::ListChannels),
        ("SM", r) => match r.and_then(|r| fields(r, 3)) {
            Some(f) => QuickParse::Command(QuickCommand::SendMail {
                recipient: f[0].clone(),
                subject: f[1].clone(),
                body: f[2].clone(),
            }),
            None => QuickParse::Usage(SM_USAGE),
        },
        ("PB", r) => match r.and_then(|r| fields(r, 3)) {
            Some(f) => QuickParse::Command(QuickCommand::PostBulletin {
                board: f[0].clone(),
                subject: f[1].clone(),
                body: f[2].clone(),
            }),
            None => QuickParse::Usage(PB_USAGE),
        },
        ("CB", r) => match r.and_then(|r| fields(r, 1)) {
            Some(f) => QuickParse::Command(QuickCommand::CheckBulletins { board: f[0].clone() }),
            None => QuickParse::Usage(CB_USAGE),
        },
        ("CHP", r) => match r.and_then(|r| fields(r, 2)) {
            Some(f) => QuickParse::Command(QuickCommand::PostChannel {
                name: f[0].clone(),
                url: f[1].clone(),
            }),
            None => QuickParse::Usage(CHP_USAGE),
        },
        _ => QuickParse::NotQuick,
    };
    if parsed != QuickParse::NotQuick {
        trace!("Parsed quick command {:?} from '{}'", parsed, crate::logutil::escape_log(raw));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_mail_keeping_commas_in_body() {
        assert_eq!(
            parse("sm,,BOB,Hello,see you at 5, bring coffee"),
            QuickParse::Command(QuickCommand::SendMail {
                recipient: "BOB".into(),
                subject: "Hello".into(),
                body: "see you at 5, bring coffee".into(),
            })
        );
    }

    #[test]
    fn bare_words_and_short_forms() {
        assert_eq!(parse(" CM "), QuickParse::Command(QuickCommand::CheckMail));
        assert_eq!(parse("chl"), QuickParse::Command(QuickCommand::ListChannels));
        assert_eq!(
            parse("CB,,News"),
            QuickParse::Command(QuickCommand::CheckBulletins { board: "News".into() })
        );
        assert_eq!(
            parse("CHP,,Ops,https://meshtastic.org/e/#abc"),
            QuickParse::Command(QuickCommand::PostChannel {
                name: "Ops".into(),
                url: "https://meshtastic.org/e/#abc".into(),
            })
        );
    }

    #[test]
    fn incomplete_commands_return_usage() {
        assert_eq!(parse("SM,,"), QuickParse::Usage(SM_USAGE));
        assert_eq!(parse("SM"), QuickParse::Usage(SM_USAGE));
        assert_eq!(parse("PB,,General,subject only"), QuickParse::Usage(PB_USAGE));
        assert_eq!(parse("CB,,"), QuickParse::Usage(CB_USAGE));
        assert_eq!(parse("CHP,,name"), QuickParse::Usage(CHP_USAGE));
    }

    #[test]
    fn menu_keys_are_not_quick_commands() {
        for input in ["m", "b", "x", "q", "cmx", "hello"] {
            assert_eq!(parse(input), QuickParse::NotQuick);
        }
    }
}

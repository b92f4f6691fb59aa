//! Reply formatting for the chat transport.
//!
//! Replies are short previews with a button that opens the full answer in
//! the mini-app. Private chats get a `web_app` button straight to
//! `{webapp_url}/message/{hash}`; groups get a deep link through the bot
//! (`https://t.me/{bot}?start=msg_{hash}`) since `web_app` buttons only work
//! in private chats.

use orbi_types::message::MessageBody;
use orbi_types::transport::{
    ChatKind, IncomingMessage, InlineKeyboardButton, InlineKeyboardMarkup, OutgoingMessage,
    ParseMode,
};

pub const NEW_CHAT_CONFIRMATION: &str = "✨ New chat started! Go ahead and ask.";
pub const FAILURE_TEXT: &str =
    "Sorry, something went wrong while processing your message. Please try again later.";

const VIEW_FULL_ANSWER: &str = "📝 View full answer";
const OPEN_ANSWER: &str = "🔍 Tap here to open the answer";
const OPEN_HISTORY: &str = "📱 Open history";

/// Characters of the answer shown inline.
pub const ANSWER_PREVIEW_LEN: usize = 200;
/// Characters of a looked-up body shown for a deep link.
pub const LOOKUP_PREVIEW_LEN: usize = 100;

/// Deep-link payload prefix used by `/start msg_<hash>`.
pub const START_PAYLOAD_PREFIX: &str = "msg_";

/// Escape text for Telegram MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
                | '{' | '}' | '.' | '!' | '\\'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Cut `text` to at most `max` characters at the last space, appending `...`.
///
/// Falls back to a hard cut when the window has no space.
pub fn format_preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let window: String = text.chars().take(max).collect();
    let cut = window.rfind(' ').unwrap_or(window.len());
    format!("{}...", &window[..cut])
}

/// A parsed inbound text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/start msg_<hash>`: open a stored answer.
    OpenMessage(&'a str),
    /// Bare `/start`.
    Start,
    /// `/newchat` or `/newchat@<bot>`.
    NewChat,
    /// Anything else.
    Text(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(text: &'a str, bot_username: &str) -> Self {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix("/start ") {
            return match rest.trim().strip_prefix(START_PAYLOAD_PREFIX) {
                Some(hash) if !hash.trim().is_empty() => Command::OpenMessage(hash.trim()),
                _ => Command::Start,
            };
        }
        let addressed = |cmd: &str| {
            trimmed == cmd
                || trimmed
                    .strip_prefix(cmd)
                    .and_then(|r| r.strip_prefix('@'))
                    .is_some_and(|name| name.eq_ignore_ascii_case(bot_username))
        };
        if addressed("/start") {
            Command::Start
        } else if addressed("/newchat") {
            Command::NewChat
        } else {
            Command::Text(text)
        }
    }
}

/// Builds outbound messages and links for one bot/front-end pair.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    webapp_url: String,
    bot_username: String,
}

impl ReplyFormatter {
    pub fn new(webapp_url: impl Into<String>, bot_username: impl Into<String>) -> Self {
        Self {
            webapp_url: webapp_url.into().trim_end_matches('/').to_string(),
            bot_username: bot_username.into(),
        }
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    pub fn message_url(&self, hash: &str) -> String {
        format!("{}/message/{hash}", self.webapp_url)
    }

    pub fn deep_link(&self, hash: &str) -> String {
        format!(
            "https://t.me/{}?start={START_PAYLOAD_PREFIX}{hash}",
            self.bot_username
        )
    }

    /// Private chats and messages mentioning the bot are handled; other group chatter is not.
    pub fn is_addressed(&self, message: &IncomingMessage, text: &str) -> bool {
        message.chat.kind == ChatKind::Private || text.contains(&self.mention())
    }

    /// The question with the bot mention removed (groups only), trimmed.
    pub fn extract_question(&self, message: &IncomingMessage, text: &str) -> String {
        if message.chat.kind == ChatKind::Private {
            text.trim().to_string()
        } else {
            text.replace(&self.mention(), "").trim().to_string()
        }
    }

    fn mention(&self) -> String {
        format!("@{}", self.bot_username)
    }

    /// Preview of an answer addressed to the asker, with a link to the full text.
    pub fn answer(&self, message: &IncomingMessage, answer: &str, hash: &str) -> OutgoingMessage {
        let name = message
            .from
            .as_ref()
            .map(|u| u.display_name().to_string())
            .unwrap_or_default();
        let text = format!(
            "Answer for {}:\n\n{}",
            escape_markdown(&name),
            escape_markdown(&format_preview(answer, ANSWER_PREVIEW_LEN))
        );

        let button = if message.chat.kind == ChatKind::Private {
            InlineKeyboardButton::web_app(VIEW_FULL_ANSWER, self.message_url(hash))
        } else {
            InlineKeyboardButton::url(VIEW_FULL_ANSWER, self.deep_link(hash))
        };

        OutgoingMessage {
            chat_id: message.chat.id,
            text,
            parse_mode: Some(ParseMode::MarkdownV2),
            reply_to_message_id: Some(message.message_id),
            reply_markup: Some(InlineKeyboardMarkup::single(button)),
        }
    }

    /// Reply to a `/start msg_<hash>` deep link for a body that exists.
    pub fn found_body(&self, chat_id: i64, body: &MessageBody) -> OutgoingMessage {
        let text = format!(
            "📝 *Answer found\\!*\n\n{}\n\n_Tap the button below to see the full answer_",
            escape_markdown(&format_preview(&body.content, LOOKUP_PREVIEW_LEN))
        );
        OutgoingMessage {
            chat_id,
            text,
            parse_mode: Some(ParseMode::MarkdownV2),
            reply_to_message_id: None,
            reply_markup: Some(InlineKeyboardMarkup::single(InlineKeyboardButton::web_app(
                OPEN_ANSWER,
                self.message_url(&body.hash),
            ))),
        }
    }

    pub fn welcome(&self, message: &IncomingMessage) -> OutgoingMessage {
        let name = message
            .from
            .as_ref()
            .map(|u| u.first_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("there");
        let text = format!(
            "Hello, {name}! 👋\n\nI'm Orbi AI, your virtual assistant. Ask me anything!\n\n\
             Available command:\n/newchat - Start a new conversation"
        );
        OutgoingMessage {
            chat_id: message.chat.id,
            text,
            parse_mode: None,
            reply_to_message_id: None,
            reply_markup: Some(InlineKeyboardMarkup::single(InlineKeyboardButton::web_app(
                OPEN_HISTORY,
                self.webapp_url.clone(),
            ))),
        }
    }

    pub fn failure(&self, chat_id: i64, reply_to: Option<i64>) -> OutgoingMessage {
        OutgoingMessage {
            reply_to_message_id: reply_to,
            ..OutgoingMessage::text(chat_id, FAILURE_TEXT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orbi_types::transport::{Chat, User};

    fn message(kind: ChatKind, text: &str) -> IncomingMessage {
        IncomingMessage {
            message_id: 11,
            from: Some(User {
                id: 1001,
                is_bot: false,
                first_name: "Ada".to_string(),
                last_name: None,
                username: Some("ada_l".to_string()),
            }),
            chat: Chat { id: 55, kind },
            text: Some(text.to_string()),
        }
    }

    fn formatter() -> ReplyFormatter {
        ReplyFormatter::new("https://app.example/", "orbi_bot")
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown("1+1=2."), "1\\+1\\=2\\.");
        assert_eq!(escape_markdown("plain text"), "plain text");
        assert_eq!(escape_markdown("C:\\"), "C:\\\\");
    }

    #[test]
    fn test_format_preview_short_text_unchanged() {
        assert_eq!(format_preview("short answer", 200), "short answer");
    }

    #[test]
    fn test_format_preview_cuts_at_last_space() {
        assert_eq!(format_preview("hello brave new world", 12), "hello brave...");
    }

    #[test]
    fn test_format_preview_hard_cut_without_space() {
        assert_eq!(format_preview("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_format_preview_multibyte() {
        let text = "é".repeat(300);
        let preview = format_preview(&text, 200);
        assert_eq!(preview.chars().count(), 203);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start msg_deadbeef", "orbi_bot"), Command::OpenMessage("deadbeef"));
        assert_eq!(Command::parse("/start msg_", "orbi_bot"), Command::Start);
        assert_eq!(Command::parse("/start", "orbi_bot"), Command::Start);
        assert_eq!(Command::parse("/newchat", "orbi_bot"), Command::NewChat);
        assert_eq!(Command::parse("/newchat@orbi_bot", "orbi_bot"), Command::NewChat);
        assert_eq!(Command::parse("/newchat@other_bot", "orbi_bot"), Command::Text("/newchat@other_bot"));
        assert_eq!(Command::parse("what is rust?", "orbi_bot"), Command::Text("what is rust?"));
    }

    #[test]
    fn test_group_filter_requires_mention() {
        let f = formatter();
        let plain = message(ChatKind::Group, "hello everyone");
        assert!(!f.is_addressed(&plain, "hello everyone"));

        let mentioned = message(ChatKind::Supergroup, "@orbi_bot what is 2+2?");
        assert!(f.is_addressed(&mentioned, "@orbi_bot what is 2+2?"));
        assert_eq!(f.extract_question(&mentioned, "@orbi_bot what is 2+2?"), "what is 2+2?");

        let private = message(ChatKind::Private, "  hi  ");
        assert!(f.is_addressed(&private, "  hi  "));
        assert_eq!(f.extract_question(&private, "  hi  "), "hi");
    }

    #[test]
    fn test_private_answer_uses_web_app_button() {
        let f = formatter();
        let msg = message(ChatKind::Private, "q");
        let out = f.answer(&msg, "It is 4.", "deadbeef");

        assert_eq!(out.chat_id, 55);
        assert_eq!(out.reply_to_message_id, Some(11));
        assert_eq!(out.parse_mode, Some(ParseMode::MarkdownV2));
        assert_eq!(out.text, "Answer for ada\\_l:\n\nIt is 4\\.");
        let button = &out.reply_markup.unwrap().inline_keyboard[0][0];
        assert_eq!(
            button.web_app.as_ref().unwrap().url,
            "https://app.example/message/deadbeef"
        );
        assert!(button.url.is_none());
    }

    #[test]
    fn test_group_answer_uses_deep_link() {
        let f = formatter();
        let msg = message(ChatKind::Group, "@orbi_bot q");
        let out = f.answer(&msg, "yes", "0badcafe");
        let button = &out.reply_markup.unwrap().inline_keyboard[0][0];
        assert_eq!(
            button.url.as_deref(),
            Some("https://t.me/orbi_bot?start=msg_0badcafe")
        );
        assert!(button.web_app.is_none());
    }

    #[test]
    fn test_found_body_preview() {
        let f = formatter();
        let body = MessageBody {
            hash: "deadbeef".to_string(),
            content: "word ".repeat(50),
            created_at: Utc::now(),
        };
        let out = f.found_body(55, &body);
        assert!(out.text.starts_with("📝 *Answer found\\!*"));
        assert!(out.text.contains("\\.\\.\\."));
        let button = &out.reply_markup.unwrap().inline_keyboard[0][0];
        assert_eq!(
            button.web_app.as_ref().unwrap().url,
            "https://app.example/message/deadbeef"
        );
    }

    #[test]
    fn test_welcome_and_failure() {
        let f = formatter();
        let welcome = f.welcome(&message(ChatKind::Private, "/start"));
        assert!(welcome.text.starts_with("Hello, Ada!"));
        assert!(welcome.parse_mode.is_none());

        let failure = f.failure(55, Some(11));
        assert_eq!(failure.text, FAILURE_TEXT);
        assert_eq!(failure.reply_to_message_id, Some(11));
        assert!(failure.reply_markup.is_none());
    }
}

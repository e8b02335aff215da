use crate::{media::MAX_FILE_SIZE, validate::SUPPORTED_DOMAINS};
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{ParseMode, User, UserId},
    utils::{command::BotCommands, html},
};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    /// Show the welcome message.
    Start,
    /// How to use the bot.
    #[command(aliases = ["h", "?"])]
    Help,
    /// Show the file size limit.
    Limit,
}

const fn limit_mib() -> u64 {
    MAX_FILE_SIZE / 1024 / 1024
}

fn supported_sites() -> String {
    SUPPORTED_DOMAINS
        .iter()
        .map(|d| d.trim_end_matches(".com"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn mention_greeting(user_id: UserId, full_name: &str) -> String {
    format!("👋 Hello {}!", html::user_mention(user_id, full_name))
}

#[must_use]
pub fn start_text(user: Option<&User>) -> String {
    let greeting = user.map_or_else(
        || "👋 Hello!".to_owned(),
        |u| mention_greeting(u.id, &u.full_name()),
    );
    format!(
        "{greeting}\n\n\
         Send me a video URL from supported sites and I'll download it for you.\n\
         Supported: {}.\n\n\
         📎 Max file size: {}MB\n\
         I'll try to deliver good quality (up to 720p).",
        supported_sites(),
        limit_mib()
    )
}

#[must_use]
pub fn help_text() -> String {
    format!(
        "📖 {}\n\n\
         1. Send me a supported video link\n\
         2. I'll fetch and send it (re-encoded to 720p if needed)\n\
         3. Max size: {}MB\n\n\
         /start - Show welcome\n\
         /limit - Show file size info",
        html::bold("Help"),
        limit_mib()
    )
}

#[must_use]
pub fn limit_text() -> String {
    format!(
        "📦 {}\n\nTelegram bot uploads are limited to {}MB per file.",
        html::bold("File Size Limit"),
        limit_mib()
    )
}

/// Handle a command from the user.
///
/// # Errors
///
/// Returns a Teloxide error if the message fails to send.
pub async fn answer(bot: Bot, msg: Message, cmd: Command) -> ResponseResult<()> {
    let text = match cmd {
        Command::Start => start_text(msg.from.as_ref()),
        Command::Help => help_text(),
        Command::Limit => limit_text(),
    };

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::{ffi::OsStr, path::Path};
use teloxide::{
    Bot,
    payloads::SendVideoSetters,
    prelude::Requester,
    types::{ChatId, InputFile},
};
use tokio::fs::File;
use tracing::info;

/// Outbound side of the chat transport.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send a plain text reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects the message.
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;

    /// Upload a local file as a video message.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the upload fails.
    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()>;
}

/// Delivery through the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramDelivery {
    bot: Bot,
}

impl TelegramDelivery {
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Delivery for TelegramDelivery {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()> {
        // The handle is owned by the request and closed when it is dropped,
        // whether or not the upload finishes.
        let file = File::open(path).await?;
        let file_name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("video.mp4")
            .to_owned();

        info!(chat_id = chat_id.0, path = %path.display(), "uploading video");

        self.bot
            .send_video(chat_id, InputFile::read(file).file_name(file_name))
            .caption(caption)
            .supports_streaming(true)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}

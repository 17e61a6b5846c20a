//! Telegram delivery adapter — maps the channel abstraction onto teloxide.
//!
//! One instance is scoped to a single chat; the dispatcher builds one per
//! incoming command.  This is the only file that talks to the Telegram API
//! for outbound traffic.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};

use crate::delivery::channel::{
    Attachment, AttachmentBody, DeliveryChannel, SendError, StatusHandle,
};

pub struct TelegramDelivery {
    bot: Bot,
    chat: ChatId,
}

impl TelegramDelivery {
    pub fn new(bot: Bot, chat: ChatId) -> Self {
        Self { bot, chat }
    }
}

/// Telegram reports an oversized upload as HTTP 413 "Request Entity Too
/// Large"; the error text is the stable way to recognise it across teloxide
/// error shapes.
fn map_send_error(e: teloxide::RequestError) -> SendError {
    let text = e.to_string();
    if text.contains("Request Entity Too Large") || text.contains("413") {
        SendError::PayloadTooLarge
    } else {
        SendError::Transport(text)
    }
}

#[async_trait]
impl DeliveryChannel for TelegramDelivery {
    async fn send_text(&self, text: &str) -> Result<StatusHandle, SendError> {
        let message = self
            .bot
            .send_message(self.chat, text)
            .await
            .map_err(map_send_error)?;
        Ok(StatusHandle(message.id.0))
    }

    async fn send_attachment(&self, attachment: Attachment) -> Result<(), SendError> {
        let Attachment {
            name,
            body,
            caption,
        } = attachment;

        let input = match body {
            AttachmentBody::File(path) => InputFile::file(path).file_name(name),
            AttachmentBody::Bytes(data) => InputFile::memory(data).file_name(name),
        };

        let mut request = self.bot.send_document(self.chat, input);
        if let Some(caption) = caption {
            request = request.caption(caption);
        }
        request.await.map_err(map_send_error)?;
        Ok(())
    }

    async fn edit_text(&self, handle: StatusHandle, text: &str) -> Result<(), SendError> {
        self.bot
            .edit_message_text(self.chat, MessageId(handle.0), text)
            .await
            .map_err(map_send_error)?;
        Ok(())
    }
}

use crate::{
    commands::{Command, answer},
    relay::{DownloadRequest, Relay},
};
use std::sync::Arc;
use teloxide::{RequestError, dispatching::UpdateHandler, prelude::*};
use tracing::{debug, info};

/// Commands go to [`answer`], any other text message becomes a download request.
#[must_use]
pub fn schema() -> UpdateHandler<RequestError> {
    Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(answer))
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(on_text))
}

/// Run the long-polling dispatcher until Ctrl-C.
pub async fn run(bot: Bot, relay: Arc<Relay>) {
    info!("dispatcher starting");
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn on_text(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if text.starts_with('/') {
        debug!(chat_id = msg.chat.id.0, "ignoring unknown command");
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let request = DownloadRequest::new(user.id, msg.chat.id, text);

    // One task per message so a long download never blocks the dispatcher.
    tokio::spawn(async move {
        let outcome = relay.handle(request).await;
        debug!(?outcome, "request finished");
    });

    Ok(())
}

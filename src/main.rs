use dotenv::dotenv;
use std::sync::Arc;
use teloxide::{Bot, prelude::Requester, utils::command::BotCommands};
use tg_video_relay::{
    commands::Command,
    compress::Ffmpeg,
    config::Config,
    delivery::TelegramDelivery,
    download::YtDlp,
    gate::ActiveDownloads,
    relay::Relay,
    router,
    telemetry::setup_logger,
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    color_eyre::install()?;
    setup_logger()?;

    let config = Config::from_env()?;
    info!(?config, "configuration loaded");

    let bot = Bot::new(&config.token);

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!(%err, "failed to register bot commands");
    }

    let relay = Arc::new(Relay::new(
        Arc::new(ActiveDownloads::new()),
        Arc::new(YtDlp::new(config.ytdlp)),
        Arc::new(Ffmpeg::new(config.ffmpeg)),
        Arc::new(TelegramDelivery::new(bot.clone())),
    ));

    info!("bot starting");
    router::run(bot, relay).await;

    Ok(())
}

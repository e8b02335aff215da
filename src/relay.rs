use crate::{
    compress::{CompressionParams, Compressor},
    delivery::Delivery,
    download::Extractor,
    error::{Error, Result},
    gate::ActiveDownloads,
    media::{MAX_FILE_SIZE, MediaArtifact},
    validate::{SupportedUrl, Validate, host_of},
};
use futures::FutureExt;
use std::{
    any::Any,
    fmt::{self, Display},
    panic::AssertUnwindSafe,
    path::Path,
    sync::Arc,
    time::Instant,
};
use teloxide::types::{ChatId, UserId};
use tempfile::{Builder, TempDir};
use tracing::{error, info, warn};

pub const BUSY_MESSAGE: &str = "⏳ Please wait, still working on your previous download...";
pub const INVALID_URL_MESSAGE: &str = "⚠️ Please send a valid URL from supported sites.";
pub const DOWNLOADING_MESSAGE: &str = "⬇️ Downloading your video, please wait...";
const COMPRESSED_FILE_NAME: &str = "compressed.mp4";
const TEMPDIR_PREFIX: &str = "tg-video-relay-";

/// One inbound URL message from one user.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub user_id: UserId,
    pub chat_id: ChatId,
    pub url: String,
    pub received_at: Instant,
}

impl DownloadRequest {
    #[must_use]
    pub fn new(user_id: UserId, chat_id: ChatId, text: &str) -> Self {
        Self {
            user_id,
            chat_id,
            url: text.trim().to_owned(),
            received_at: Instant::now(),
        }
    }
}

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validating,
    Downloading,
    SizeCheck,
    Compressing,
    SizeRecheck,
    Delivering,
    Done,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Validating => "validating",
            Self::Downloading => "downloading",
            Self::SizeCheck => "size_check",
            Self::Compressing => "compressing",
            Self::SizeRecheck => "size_recheck",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a request ended.
#[derive(Debug)]
pub enum Outcome {
    /// The user already had a request in flight; nothing was started.
    Busy,
    /// The text was not a supported URL.
    Rejected,
    Delivered { compressed: bool },
    Failed { stage: Stage, error: Error },
}

impl Outcome {
    #[must_use]
    pub const fn final_stage(&self) -> Stage {
        match self {
            Self::Delivered { .. } => Stage::Done,
            Self::Busy | Self::Rejected | Self::Failed { .. } => Stage::Failed,
        }
    }
}

/// Request lifecycle controller: validate, download, compress if needed, deliver.
pub struct Relay {
    gate: Arc<ActiveDownloads>,
    extractor: Arc<dyn Extractor>,
    compressor: Arc<dyn Compressor>,
    delivery: Arc<dyn Delivery>,
    params: CompressionParams,
    size_limit: u64,
}

impl Relay {
    #[must_use]
    pub fn new(
        gate: Arc<ActiveDownloads>,
        extractor: Arc<dyn Extractor>,
        compressor: Arc<dyn Compressor>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        Self {
            gate,
            extractor,
            compressor,
            delivery,
            params: CompressionParams::default(),
            size_limit: MAX_FILE_SIZE,
        }
    }

    /// Run one request to completion. Never fails: every fault is logged and
    /// reported to the chat, and the user's gate entry is always released.
    pub async fn handle(&self, request: DownloadRequest) -> Outcome {
        let user_id = request.user_id;
        let chat_id = request.chat_id;

        if self.gate.contains(user_id) {
            return self.reject_busy(user_id, chat_id).await;
        }

        // No permit is held while the invalid-URL reply goes out.
        let url = match SupportedUrl.validate(&request.url) {
            Ok(url) => url,
            Err(err) => {
                info!(user_id = user_id.0, %err, "rejecting message");
                self.notify(chat_id, INVALID_URL_MESSAGE).await;
                return Outcome::Rejected;
            }
        };

        let Some(_permit) = self.gate.permit(user_id) else {
            return self.reject_busy(user_id, chat_id).await;
        };

        let host = host_of(&url);
        info!(
            user_id = user_id.0,
            chat_id = chat_id.0,
            url = %url,
            host = host.as_deref().unwrap_or("-"),
            "accepted download request"
        );
        self.notify(chat_id, DOWNLOADING_MESSAGE).await;

        let mut stage = Stage::Validating;
        let run = AssertUnwindSafe(self.process(chat_id, &url, &mut stage)).catch_unwind();
        let result = run.await.unwrap_or_else(|panic| Err(panic_error(&*panic)));
        let elapsed_ms =
            u64::try_from(request.received_at.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(compressed) => {
                info!(user_id = user_id.0, compressed, elapsed_ms, "request done");
                Outcome::Delivered { compressed }
            }
            Err(err) => {
                error!(user_id = user_id.0, %stage, %err, elapsed_ms, "request failed");
                self.notify(chat_id, &format!("❌ Error: {}", err.user_message()))
                    .await;
                Outcome::Failed { stage, error: err }
            }
        }
    }

    /// Download, size-check, compress and deliver inside a scoped temp dir.
    /// Returns whether the file had to be compressed.
    async fn process(&self, chat_id: ChatId, url: &str, stage: &mut Stage) -> Result<bool> {
        let workdir = scoped_tempdir()?;

        *stage = Stage::Downloading;
        let mut artifact = self.download(url, workdir.path()).await?;

        *stage = Stage::SizeCheck;
        let compressed = artifact.exceeds(self.size_limit);
        if compressed {
            info!(
                size = artifact.size_bytes,
                limit = self.size_limit,
                "file too large, compressing"
            );

            *stage = Stage::Compressing;
            let output = workdir.path().join(COMPRESSED_FILE_NAME);
            self.compressor
                .compress(&artifact.path, &output, &self.params)
                .await?;

            *stage = Stage::SizeRecheck;
            artifact.replace_file(output).await?;
            if artifact.exceeds(self.size_limit) {
                return Err(Error::TooLarge {
                    size: artifact.size_bytes,
                    limit: self.size_limit,
                });
            }
        }

        *stage = Stage::Delivering;
        self.delivery
            .send_video(chat_id, &artifact.path, &artifact.caption())
            .await?;

        *stage = Stage::Done;
        // `workdir` is dropped here, or on any early return above.
        Ok(compressed)
    }

    async fn download(&self, url: &str, dir: &Path) -> Result<MediaArtifact> {
        let extracted = self.extractor.extract(url, dir).await?;
        let artifact = MediaArtifact::from_path(extracted.path, extracted.title).await?;
        info!(title = %artifact.title, size = artifact.size_bytes, "downloaded");
        Ok(artifact)
    }

    async fn reject_busy(&self, user_id: UserId, chat_id: ChatId) -> Outcome {
        info!(user_id = user_id.0, "download already in flight, rejecting");
        self.notify(chat_id, BUSY_MESSAGE).await;
        Outcome::Busy
    }

    /// Best-effort text reply; a failed notice is only logged.
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(err) = self.delivery.send_text(chat_id, text).await {
            warn!(chat_id = chat_id.0, %err, "failed to send reply");
        }
    }
}

fn scoped_tempdir() -> Result<TempDir> {
    Ok(Builder::new().prefix(TEMPDIR_PREFIX).tempdir()?)
}

fn panic_error(panic: &(dyn Any + Send)) -> Error {
    let msg = panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into());
    Error::other(format!("internal error: {msg}"))
}

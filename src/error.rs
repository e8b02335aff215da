use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] tokio::io::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("yt-dlp failed: {0}")]
    YtDlpFailed(String),

    #[error("no media found")]
    NoMediaFound,

    #[error("ffmpeg failed: {0}")]
    CompressionFailed(String),

    #[error("file is {size} bytes after compression, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("teloxide error: {0}")]
    Teloxide(#[from] teloxide::RequestError),

    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("other: {0}")]
    Other(String),
}

impl Error {
    #[inline]
    pub fn other(text: impl Into<String>) -> Self {
        Self::Other(text.into())
    }

    #[inline]
    pub fn invalid_url(text: impl Into<String>) -> Self {
        Self::InvalidUrl(text.into())
    }

    #[inline]
    pub fn ytdlp_failed(text: impl Into<String>) -> Self {
        Self::YtDlpFailed(text.into())
    }

    #[inline]
    pub fn compression_failed(text: impl Into<String>) -> Self {
        Self::CompressionFailed(text.into())
    }

    #[inline]
    pub fn config(text: impl Into<String>) -> Self {
        Self::Config(text.into())
    }

    /// Short cause shown to the chat user. Full details only go to the log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => "Please send a valid URL from supported sites.".into(),
            Self::YtDlpFailed(_) | Self::NoMediaFound => {
                "Failed to download. URL might be invalid.".into()
            }
            Self::CompressionFailed(_) => "Failed to compress the video.".into(),
            Self::TooLarge { .. } => "Even after compression, the video is too large.".into(),
            Self::Teloxide(_) => "Failed to send the video.".into(),
            Self::Other(text) => text.clone(),
            Self::Io(_) | Self::MissingEnv(_) | Self::Config(_) => {
                "Something went wrong while processing the video.".into()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

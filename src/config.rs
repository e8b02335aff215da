use crate::error::{Error, Result};
use std::{env, fmt, path::PathBuf};

#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub ytdlp: YtDlpConfig,
    pub ffmpeg: FfmpegConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpConfig {
    pub bin: String,
    pub cookies_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegConfig {
    pub bin: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// - Returns `Error::MissingEnv` if `TELEGRAM_BOT_TOKEN` is not set.
    /// - Returns `Error::Config` if `YTDLP_EXTRA_ARGS` cannot be split.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingEnv("TELEGRAM_BOT_TOKEN"))?;

        Ok(Self {
            token,
            ytdlp: YtDlpConfig::from_lookup(&lookup)?,
            ffmpeg: FfmpegConfig::from_lookup(&lookup),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("ytdlp", &self.ytdlp)
            .field("ffmpeg", &self.ffmpeg)
            .finish()
    }
}

impl YtDlpConfig {
    const DEFAULT_BIN: &'static str = "yt-dlp";

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let extra_args = match lookup("YTDLP_EXTRA_ARGS") {
            Some(raw) => shlex::split(&raw)
                .ok_or_else(|| Error::config(format!("cannot parse YTDLP_EXTRA_ARGS: {raw}")))?,
            None => Vec::new(),
        };

        Ok(Self {
            bin: lookup("YTDLP_BIN").unwrap_or_else(|| Self::DEFAULT_BIN.into()),
            cookies_path: lookup("YTDLP_COOKIES_PATH")
                .map(PathBuf::from)
                .filter(|p| p.is_file()),
            extra_args,
        })
    }
}

impl FfmpegConfig {
    const DEFAULT_BIN: &'static str = "ffmpeg";

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bin: lookup("FFMPEG_BIN").unwrap_or_else(|| Self::DEFAULT_BIN.into()),
        }
    }
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            bin: Self::DEFAULT_BIN.into(),
            cookies_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            bin: Self::DEFAULT_BIN.into(),
        }
    }
}

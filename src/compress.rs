use crate::{
    config::FfmpegConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use std::{ffi::OsString, path::Path, process::Stdio};
use tokio::process::Command;
use tracing::{debug, info};

/// Encoding settings for the re-encode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionParams {
    pub max_height: u32,
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub video_crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            max_height: 720,
            video_codec: "libx264",
            preset: "fast",
            video_crf: 28,
            audio_codec: "aac",
            audio_bitrate: "96k",
        }
    }
}

impl CompressionParams {
    /// Full ffmpeg argument list for `input` -> `output`.
    #[must_use]
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.into());
        args.extend(
            [
                "-vf".to_string(),
                format!("scale=-2:{}", self.max_height),
                "-c:v".into(),
                self.video_codec.into(),
                "-preset".into(),
                self.preset.into(),
                "-crf".into(),
                self.video_crf.to_string(),
                "-c:a".into(),
                self.audio_codec.into(),
                "-b:a".into(),
                self.audio_bitrate.into(),
                "-movflags".into(),
                "+faststart".into(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }
}

#[async_trait]
pub trait Compressor: Send + Sync {
    /// Re-encode `input` into `output`.
    ///
    /// # Errors
    ///
    /// Returns `Error::CompressionFailed` if the encoder exits unsuccessfully.
    async fn compress(&self, input: &Path, output: &Path, params: &CompressionParams)
    -> Result<()>;
}

/// Compression adapter backed by the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg {
    config: FfmpegConfig,
}

impl Ffmpeg {
    #[must_use]
    pub const fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Compressor for Ffmpeg {
    async fn compress(
        &self,
        input: &Path,
        output: &Path,
        params: &CompressionParams,
    ) -> Result<()> {
        let args = params.ffmpeg_args(input, output);
        debug!(bin = %self.config.bin, ?args, "running ffmpeg");

        let out = Command::new(&self.config.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::compression_failed(format!("cannot run {}: {e}", self.config.bin))
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            let reason = if stderr.is_empty() {
                out.status.code().map_or_else(
                    || "terminated by signal".to_string(),
                    |c| format!("exit status {c}"),
                )
            } else {
                stderr
            };
            return Err(Error::compression_failed(reason));
        }

        info!(output = %output.display(), "ffmpeg finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_args() {
        let args = CompressionParams::default()
            .ffmpeg_args(Path::new("/tmp/in.webm"), Path::new("/tmp/compressed.mp4"));
        let args = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-i",
                "/tmp/in.webm",
                "-vf",
                "scale=-2:720",
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-crf",
                "28",
                "-c:a",
                "aac",
                "-b:a",
                "96k",
                "-movflags",
                "+faststart",
                "/tmp/compressed.mp4",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_a_compression_fault() {
        let dir = tempdir().unwrap();
        let ffmpeg = Ffmpeg::new(FfmpegConfig {
            bin: "false".into(),
        });
        let err = ffmpeg
            .compress(
                &dir.path().join("in.mp4"),
                &dir.path().join("out.mp4"),
                &CompressionParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompressionFailed(ref r) if r == "exit status 1"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_compression_fault() {
        let dir = tempdir().unwrap();
        let ffmpeg = Ffmpeg::new(FfmpegConfig {
            bin: "definitely-not-an-ffmpeg-binary".into(),
        });
        let err = ffmpeg
            .compress(
                &dir.path().join("in.mp4"),
                &dir.path().join("out.mp4"),
                &CompressionParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CompressionFailed(_)));
    }
}

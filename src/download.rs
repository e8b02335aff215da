use crate::{
    config::YtDlpConfig,
    error::{Error, Result},
    media::{DEFAULT_TITLE, MediaKind, VIDEO_EXTS, detect_media_kind},
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    sync::OnceLock,
};
use tokio::{
    fs::{metadata, read_dir, try_exists},
    process::Command,
};
use tracing::{debug, info, warn};

const FORBIDDEN_EXTENSIONS: &[&str] = &["json", "txt", "log", "part", "ytdl"];

/// Best stream at or below 720p, merged into one container.
pub const FORMAT_SELECTOR: &str = "bestvideo[height<=720]+bestaudio/best[height<=720]";
pub const MERGE_FORMAT: &str = "mp4";
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// What the extraction engine produced for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub path: PathBuf,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Download `url` into `out_dir`.
    ///
    /// # Errors
    ///
    /// Fails when the source cannot be fetched or parsed, or nothing usable
    /// was written to `out_dir`.
    async fn extract(&self, url: &str, out_dir: &Path) -> Result<Extracted>;
}

/// Subset of the yt-dlp info dict printed after the file has been moved in place.
#[derive(Debug, Default, Deserialize)]
struct InfoDict {
    title: Option<String>,
    filepath: Option<PathBuf>,
    #[serde(rename = "_filename")]
    filename: Option<PathBuf>,
}

/// Extraction adapter backed by the `yt-dlp` binary.
#[derive(Debug, Clone, Default)]
pub struct YtDlp {
    config: YtDlpConfig,
}

impl YtDlp {
    #[must_use]
    pub const fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Arguments for one download into `out_dir`.
    #[must_use]
    pub fn args(&self, url: &str, out_dir: &Path) -> Vec<String> {
        let template = out_dir.join(OUTPUT_TEMPLATE);
        let mut args = [
            "--no-playlist",
            "--restrict-filenames",
            "--quiet",
            "--no-warnings",
            "--no-progress",
            "-f",
            FORMAT_SELECTOR,
            "--merge-output-format",
            MERGE_FORMAT,
            "--print",
            "after_move:%()j",
            "-o",
        ]
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

        args.push(template.to_string_lossy().into_owned());

        if let Some(cookies_path) = &self.config.cookies_path {
            args.extend(["--cookies".into(), cookies_path.to_string_lossy().into_owned()]);
        }
        args.extend(self.config.extra_args.iter().cloned());

        // End of options, so a URL can never be read as a flag.
        args.push("--".into());
        args.push(url.into());
        args
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn extract(&self, url: &str, out_dir: &Path) -> Result<Extracted> {
        let args = self.args(url, out_dir);
        debug!(bin = %self.config.bin, ?args, "running yt-dlp");

        let output = Command::new(&self.config.bin)
            .current_dir(out_dir)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ytdlp_failed(format!("cannot run {}: {e}", self.config.bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ytdlp_failed(error_reason(&stderr, output.status.code())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let info = parse_info(&stdout).unwrap_or_else(|| {
            warn!("yt-dlp printed no info dict, falling back to directory scan");
            InfoDict::default()
        });

        let title = info
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_TITLE)
            .to_owned();

        let reported = info.filepath.or(info.filename);
        let path = resolve_output(reported.as_deref(), out_dir).await?;

        info!(title = %title, path = %path.display(), "yt-dlp finished");
        Ok(Extracted { title, path })
    }
}

fn error_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^ERROR:\s*(?:\[[^\]]+\]\s*)?(.+?)\s*$")
            .expect("failed to compile yt-dlp error regex")
    })
}

/// Pull the last `ERROR:` line out of yt-dlp's stderr.
fn error_reason(stderr: &str, code: Option<i32>) -> String {
    let reason = error_line_regex()
        .captures_iter(stderr)
        .last()
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .or_else(|| {
            stderr
                .lines()
                .map(str::trim)
                .rfind(|l| !l.is_empty())
                .map(ToOwned::to_owned)
        });

    match (reason, code) {
        (Some(reason), _) => reason,
        (None, Some(code)) => format!("exit status {code}"),
        (None, None) => "terminated by signal".into(),
    }
}

/// The info dict is the last JSON object yt-dlp printed.
fn parse_info(stdout: &str) -> Option<InfoDict> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|l| l.starts_with('{'))
        .find_map(|l| serde_json::from_str(l).ok())
}

/// Locate the produced file: the reported path, its `.mp4` sibling (merged
/// output), or the largest media file in `out_dir`.
async fn resolve_output(reported: Option<&Path>, out_dir: &Path) -> Result<PathBuf> {
    if let Some(path) = reported {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            out_dir.join(path)
        };
        if try_exists(&path).await? {
            return Ok(path);
        }
        let merged = path.with_extension(MERGE_FORMAT);
        if try_exists(&merged).await? {
            return Ok(merged);
        }
        warn!(path = %path.display(), "reported file does not exist");
    }

    pick_media_file(out_dir).await
}

/// Largest video in `dir`. Images (e.g. thumbnails) are never picked.
async fn pick_media_file(dir: &Path) -> Result<PathBuf> {
    let mut rd = read_dir(dir).await?;
    let mut candidates = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if !is_potential_media_file(&path) {
            continue;
        }
        let meta = metadata(&path).await?;
        if !meta.is_file() || meta.len() == 0 {
            continue;
        }
        if detect_media_kind(&path).await == MediaKind::Video {
            candidates.push((meta.len(), path));
        }
    }

    info!(files = candidates.len(), "Collected video files from tempdir");

    candidates
        .into_iter()
        .max()
        .map(|(_, path)| path)
        .ok_or(Error::NoMediaFound)
}

/// Filter function to determine if a file is potentially media based on name/extension.
fn is_potential_media_file(path: &Path) -> bool {
    if let Some(filename) = path.file_name().and_then(OsStr::to_str) {
        // Skip common non-media files
        if filename.starts_with('.') || filename.to_lowercase().contains("metadata") {
            return false;
        }
    }

    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        // Let the magic-byte probe decide
        return true;
    };

    if FORBIDDEN_EXTENSIONS
        .iter()
        .any(|forbidden| forbidden.eq_ignore_ascii_case(ext))
    {
        return false;
    }

    VIDEO_EXTS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn is_potential_media_file_() {
        assert!(is_potential_media_file(Path::new("video.mp4")));
        assert!(!is_potential_media_file(Path::new("image.jpg")));
        assert!(!is_potential_media_file(Path::new(".DS_Store")));
        assert!(!is_potential_media_file(Path::new("metadata.json")));
        assert!(!is_potential_media_file(Path::new("download.log")));
        assert!(!is_potential_media_file(Path::new("video.mp4.part")));
    }

    #[test]
    fn args_contain_format_and_template() {
        let ytdlp = YtDlp::new(YtDlpConfig {
            cookies_path: Some("/tmp/cookies.txt".into()),
            extra_args: vec!["--geo-bypass".into()],
            ..YtDlpConfig::default()
        });
        let args = ytdlp.args("https://vimeo.com/1", Path::new("/tmp/job"));

        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("-f") + 1], FORMAT_SELECTOR);
        assert_eq!(args[pos("--merge-output-format") + 1], "mp4");
        assert_eq!(args[pos("-o") + 1], "/tmp/job/%(title)s.%(ext)s");
        assert_eq!(args[pos("--cookies") + 1], "/tmp/cookies.txt");
        assert!(args.contains(&"--geo-bypass".to_string()));
        assert_eq!(&args[args.len() - 2..], ["--", "https://vimeo.com/1"]);
    }

    #[test]
    fn error_reason_takes_last_error_line() {
        let stderr = "WARNING: something\n\
                      ERROR: [vimeo] 12345: Unable to download webpage: HTTP Error 404\n";
        assert_eq!(
            error_reason(stderr, Some(1)),
            "12345: Unable to download webpage: HTTP Error 404"
        );
        assert_eq!(error_reason("", Some(2)), "exit status 2");
        assert_eq!(error_reason("  \n", None), "terminated by signal");
        assert_eq!(error_reason("Traceback\nKeyError: 'x'\n", Some(1)), "KeyError: 'x'");
    }

    #[test]
    fn parse_info_reads_last_json_line() {
        let stdout = "noise\n{\"title\": \"Test Clip\", \"filepath\": \"/tmp/x/Test_Clip.mp4\"}\n";
        let info = parse_info(stdout).unwrap();
        assert_eq!(info.title.as_deref(), Some("Test Clip"));
        assert_eq!(info.filepath, Some(PathBuf::from("/tmp/x/Test_Clip.mp4")));
        assert!(parse_info("nothing here").is_none());
    }

    #[tokio::test]
    async fn resolve_output_falls_back_to_mp4_sibling() {
        let dir = tempdir().unwrap();
        let merged = dir.path().join("clip.mp4");
        fs::write(&merged, b"data").unwrap();

        let reported = dir.path().join("clip.webm");
        let path = resolve_output(Some(&reported), dir.path()).await.unwrap();
        assert_eq!(path, merged);
    }

    #[tokio::test]
    async fn resolve_output_scans_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("small.mp4"), vec![0; 10]).unwrap();
        fs::write(dir.path().join("big.mkv"), vec![0; 100]).unwrap();
        fs::write(dir.path().join("cover.jpg"), vec![0; 1000]).unwrap();
        fs::write(dir.path().join("info.json"), vec![0; 5000]).unwrap();

        let path = resolve_output(None, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("big.mkv"));
    }

    #[tokio::test]
    async fn thumbnail_alone_is_not_picked() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Clip.jpg"), vec![0xFF; 2048]).unwrap();
        fs::write(dir.path().join("Clip.webp"), vec![0xFF; 2048]).unwrap();
        let err = resolve_output(None, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::NoMediaFound));
    }

    #[tokio::test]
    async fn resolve_output_without_media_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("info.json"), b"{}").unwrap();
        let err = resolve_output(None, dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::NoMediaFound));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_binary_is_an_extraction_fault() {
        let dir = tempdir().unwrap();
        let ytdlp = YtDlp::new(YtDlpConfig {
            bin: "false".into(),
            ..YtDlpConfig::default()
        });
        let err = ytdlp
            .extract("https://vimeo.com/1", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::YtDlpFailed(_)));
    }
}

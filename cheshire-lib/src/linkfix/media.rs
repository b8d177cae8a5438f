use super::pipeline::MediaFetcher;
use crate::config::MediaConfig;
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::{OptionExt, Result, WrapErr, bail};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// A downloaded file inside its own temporary directory. Dropping this
/// removes the directory and the file with it.
#[derive(Debug)]
pub struct DownloadedMedia {
    path: PathBuf,
    _directory: TempDir,
}

impl AsRef<Path> for DownloadedMedia {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

/// Runs `yt-dlp` on a small pool of blocking workers.
pub struct YtDlp {
    config: Arc<MediaConfig>,
    permits: Arc<Semaphore>,
}

impl YtDlp {
    pub fn new(config: MediaConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

        Self {
            config: Arc::new(config),
            permits,
        }
    }

    /// Best video + audio under the ceiling, or the best single file under
    /// it. Instagram and Facebook often report no size at all, so the last
    /// resort is the best single file, left to `--max-filesize` and
    /// [`check_artifact`].
    fn format_selector(&self) -> String {
        let max = self.config.max_filesize_bytes;
        format!(
            "bv*[filesize<{max}]+ba/b[filesize<{max}]/bv*[filesize_approx<{max}]+ba/b[filesize_approx<{max}]/b"
        )
    }

    fn arguments(&self, url: &str, directory: &Path) -> Vec<OsString> {
        let mut arguments: Vec<OsString> = vec![
            "--no-playlist".into(),
            "--quiet".into(),
            "--no-warnings".into(),
            "--no-progress".into(),
            "--no-simulate".into(),
            "--format".into(),
            self.format_selector().into(),
            "--max-filesize".into(),
            self.config.max_filesize_bytes.to_string().into(),
            "--merge-output-format".into(),
            "mp4".into(),
            "--output".into(),
            directory.join("%(id)s.%(ext)s").into_os_string(),
            "--print".into(),
            "after_move:filepath".into(),
        ];

        match &self.config.cookies_file {
            Some(cookies) if cookies.is_file() => {
                arguments.push("--cookies".into());
                arguments.push(cookies.clone().into_os_string());
            }
            Some(cookies) => {
                tracing::warn!("Cookies file {} not found, ignoring", cookies.display());
            }
            None => {}
        }

        arguments.push("--".into());
        arguments.push(url.into());

        arguments
    }

    fn temp_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.config.temp_prefix);

        let directory = match &self.config.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };

        directory.wrap_err("Failed to create download directory")
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn download(&self, url: &str) -> Result<DownloadedMedia> {
        let _permit = self
            .permits
            .acquire()
            .await
            .wrap_err("Download pool is closed")?;

        let directory = self.temp_dir()?;

        let mut command = Command::new(&self.config.yt_dlp_path);
        command.args(self.arguments(url, directory.path()));

        let output = tokio::task::spawn_blocking(move || command.output())
            .await
            .wrap_err("Download worker panicked")?
            .wrap_err_with(|| format!("Failed to run {}", self.config.yt_dlp_path.display()))?;

        if !output.status.success() {
            bail!(
                "yt-dlp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let path = printed_path(&output.stdout).ok_or_eyre("yt-dlp did not produce a file")?;
        check_artifact(&path, directory.path(), self.config.max_filesize_bytes)?;

        tracing::debug!("Downloaded {} to {}", url, path.display());

        Ok(DownloadedMedia {
            path,
            _directory: directory,
        })
    }
}

impl MediaFetcher for YtDlp {
    type Media = DownloadedMedia;

    async fn fetch(&self, url: &str) -> Option<DownloadedMedia> {
        self.download(url)
            .await
            .trace_warn_ok(&format!("No media for {url}"))
    }
}

/// The last line yt-dlp printed, which is the final file path.
fn printed_path(stdout: &[u8]) -> Option<PathBuf> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(PathBuf::from)
}

fn check_artifact(path: &Path, directory: &Path, max_bytes: u64) -> Result<()> {
    if !path.starts_with(directory) {
        bail!("{} is outside the download directory", path.display());
    }

    let metadata =
        std::fs::metadata(path).wrap_err_with(|| format!("{} is missing", path.display()))?;

    if !metadata.is_file() {
        bail!("{} is not a file", path.display());
    }

    if metadata.len() > max_bytes {
        bail!(
            "{} is {} bytes, over the {} byte limit",
            path.display(),
            metadata.len(),
            max_bytes
        );
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(root: &Path) -> MediaConfig {
        MediaConfig {
            yt_dlp_path: PathBuf::from("/nonexistent/yt-dlp"),
            temp_root: Some(root.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn arguments_cap_the_size() {
        let root = tempfile::tempdir().unwrap();
        let ytdlp = YtDlp::new(config(root.path()));

        let arguments = ytdlp.arguments("https://www.instagram.com/reel/abc/", root.path());
        let arguments = arguments
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>();

        let format = arguments
            .iter()
            .position(|a| a == "--format")
            .map(|i| &arguments[i + 1])
            .unwrap();
        assert!(format.starts_with("bv*[filesize<24000000]+ba/"));
        assert!(format.ends_with("/b"));
        assert_eq!(format.split('/').filter(|choice| !choice.contains('<')).count(), 1);

        assert!(arguments.windows(2).any(|w| w == ["--max-filesize", "24000000"]));
        assert_eq!(
            arguments.last().map(String::as_str),
            Some("https://www.instagram.com/reel/abc/")
        );
        assert!(!arguments.iter().any(|a| a == "--cookies"));
    }

    #[test]
    fn cookies_only_when_present() {
        let root = tempfile::tempdir().unwrap();
        let cookies = root.path().join("cookies.txt");

        let mut with_missing = config(root.path());
        with_missing.cookies_file = Some(cookies.clone());
        let arguments = YtDlp::new(with_missing).arguments("https://facebook.com/x", root.path());
        assert!(!arguments.iter().any(|a| a == "--cookies"));

        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();
        let mut with_cookies = config(root.path());
        with_cookies.cookies_file = Some(cookies.clone());
        let arguments = YtDlp::new(with_cookies).arguments("https://facebook.com/x", root.path());
        assert!(
            arguments
                .windows(2)
                .any(|w| w[0] == "--cookies" && w[1].as_os_str() == cookies.as_os_str())
        );
    }

    #[tokio::test]
    async fn failed_download_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let ytdlp = YtDlp::new(config(root.path()));

        assert!(ytdlp.fetch("https://www.instagram.com/reel/abc/").await.is_none());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn printed_path_is_last_line() {
        assert_eq!(
            printed_path(b"/tmp/a/first.webm\n/tmp/a/final.mp4\n\n"),
            Some(PathBuf::from("/tmp/a/final.mp4"))
        );
        assert_eq!(printed_path(b"\n  \n"), None);
    }

    #[test]
    fn artifact_checks() {
        let directory = tempfile::tempdir().unwrap();
        let file = directory.path().join("clip.mp4");
        std::fs::write(&file, vec![0u8; 64]).unwrap();

        assert!(check_artifact(&file, directory.path(), 64).is_ok());
        assert!(check_artifact(&file, directory.path(), 63).is_err());
        assert!(check_artifact(&directory.path().join("gone.mp4"), directory.path(), 64).is_err());
        assert!(check_artifact(Path::new("/etc/hostname"), directory.path(), 1 << 20).is_err());
    }

    #[test]
    fn dropping_media_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let ytdlp = YtDlp::new(config(root.path()));

        let directory = ytdlp.temp_dir().unwrap();
        let kept = directory.path().to_path_buf();
        let path = kept.join("clip.mp4");
        std::fs::write(&path, b"video").unwrap();

        let media = DownloadedMedia {
            path,
            _directory: directory,
        };
        assert!(media.as_ref().is_file());
        assert!(
            kept.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("cheshire_media_")
        );

        drop(media);
        assert!(!kept.exists());
    }
}

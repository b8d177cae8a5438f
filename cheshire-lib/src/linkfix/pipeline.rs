use super::{classify::classify, rewrite::rewrite_links, scan::candidate_urls};
use cheshire_traits::ForwardRefToTracing;
use color_eyre::eyre::Result;
use std::path::Path;

/// Fetches the media behind an Instagram/Facebook url.
pub trait MediaFetcher {
    /// Owns the downloaded artifact; dropping it cleans up after the download.
    type Media: AsRef<Path>;

    /// `None` means the url is skipped. Failures are logged by the fetcher.
    async fn fetch(&self, url: &str) -> Option<Self::Media>;
}

/// Publishes replacements for the original message and removes it.
pub trait Reposter {
    async fn repost_media(&self, url: &str, file: &Path) -> Result<()>;
    async fn repost_text(&self, text: &str) -> Result<()>;
    async fn delete_original(&self) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub media_reposted: usize,
    pub text_reposted: bool,
    pub deleted: bool,
}

impl Outcome {
    pub fn reposted(&self) -> bool {
        self.media_reposted > 0 || self.text_reposted
    }
}

/// scan -> classify -> (download | rewrite) -> repost -> delete.
///
/// Media is handled first, one url at a time, then the rewritten text. The
/// original is deleted once, and only if something was reposted. No step
/// failure stops the rest of the message from being processed.
pub async fn run(
    content: &str,
    fetcher: &impl MediaFetcher,
    reposter: &impl Reposter,
) -> Outcome {
    let mut outcome = Outcome::default();

    let media_urls = candidate_urls(content)
        .into_iter()
        .map(|span| span.url)
        .filter(|url| classify(url).is_media())
        .collect::<Vec<_>>();

    for url in media_urls {
        let Some(media) = fetcher.fetch(url).await else {
            tracing::debug!("No media for {}, skipping", url);
            continue;
        };

        if reposter
            .repost_media(url, media.as_ref())
            .await
            .trace_err_ok()
            .is_some()
        {
            outcome.media_reposted += 1;
        }
    }

    let rewritten = rewrite_links(content);
    if rewritten.changed {
        outcome.text_reposted = reposter
            .repost_text(&rewritten.text)
            .await
            .trace_err_ok()
            .is_some();
    }

    if outcome.reposted() {
        outcome.deleted = reposter
            .delete_original()
            .await
            .trace_warn_ok("Failed to delete reposted message")
            .is_some();
    }

    outcome
}

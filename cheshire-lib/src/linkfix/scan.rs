use regex::Regex;
use std::{ops::Range, sync::LazyLock};

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s>]+").expect("url pattern is valid"));

/// A url found in message text, with its byte range in that text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSpan<'a> {
    pub range: Range<usize>,
    pub url: &'a str,
}

/// Finds every raw http(s) url in `content`, in order.
///
/// A url runs until whitespace or `>`. Urls directly preceded by `<` are
/// embed-suppressed by the user and are skipped. Nothing is decoded or
/// normalized.
pub fn candidate_urls(content: &str) -> Vec<UrlSpan<'_>> {
    let mut spans = Vec::new();
    let mut position = 0;

    while let Some(found) = URL.find_at(content, position) {
        if content[..found.start()].ends_with('<') {
            // `h` is one byte, so this stays on a char boundary.
            position = found.start() + 1;
            continue;
        }

        spans.push(UrlSpan {
            range: found.range(),
            url: found.as_str(),
        });
        position = found.end();
    }

    spans
}
